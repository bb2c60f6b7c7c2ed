use clap::Parser;
use releasekit_core::{
    capture_env, init_cli_logging, publish_from_env, Channel, GitHubClient, LogContext,
    ManifestFormat, ManifestGenerator, ManifestRequest, PublishOptions, ReleaseKitError,
    SentryCli, SentryCliConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

mod config;
use config::Config;


#[derive(Parser)]
#[command(name = "releasekit")]
#[command(about = "Publish Sentry releases and generate desktop updater manifests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Parser)]
enum Commands {
    /// Ensure the release exists, upload debug artifacts, then finalize it
    Publish {
        /// Source map directory (overrides SENTRY_SOURCEMAPS_DIR)
        #[arg(long)]
        sourcemaps_dir: Option<PathBuf>,

        /// Native debug symbol directory (overrides SENTRY_DEBUG_ROOT)
        #[arg(long)]
        debug_root: Option<PathBuf>,
    },
    /// Generate updater manifests from a GitHub release
    Manifest {
        /// Repository owner
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// Release tag, e.g. v1.2.3
        #[arg(long)]
        tag: String,

        /// Directory the manifest files are written to
        #[arg(long)]
        out_dir: PathBuf,

        /// Update channel (stable, nightly)
        #[arg(long, default_value = "stable")]
        channel: String,

        /// Output layout (combined, per-platform)
        #[arg(long, default_value = "combined")]
        format: String,

        /// Release notes; defaults to a generated summary
        #[arg(long)]
        notes: Option<String>,

        /// Comma-separated os-arch keys to include, e.g. darwin-aarch64,windows-x86_64
        #[arg(long)]
        platforms: Option<String>,

        /// Version to publish; defaults to the tag without its leading v
        #[arg(long)]
        version: Option<String>,

        /// Environment variable holding the GitHub token
        #[arg(long, default_value = "GITHUB_TOKEN")]
        token_env: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_cli_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Process exit status for a failed run
fn exit_status(error: &anyhow::Error) -> u8 {
    let code = error
        .downcast_ref::<ReleaseKitError>()
        .map_or(1, ReleaseKitError::exit_code);
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_and_validate(cli.config.as_deref())?;
    let context = LogContext::new("main", "releasekit-cli");

    match cli.command {
        Some(Commands::Publish { sourcemaps_dir, debug_root }) => {
            context.info("Publishing release");

            let env = capture_env();
            let options = PublishOptions {
                defaults: config.publish.directory_defaults(),
                sourcemaps_dir,
                debug_root,
                projects: config.sentry.projects.clone(),
            };
            let report = publish_from_env(&env, &options, |inputs| {
                let mut sentry = SentryCliConfig::new(inputs.auth_token.clone()).with_env(&env);
                sentry.program = config.sentry.program.clone();
                sentry.install_command = config.sentry.install_command.clone();
                SentryCli::new(sentry)
            })
            .await?;
            info!(
                release = %report.release,
                state = ?report.release_state,
                sourcemaps = ?report.sourcemaps,
                debug_symbols = ?report.debug_symbols,
                "Publish finished"
            );
        }
        Some(Commands::Manifest {
            owner,
            repo,
            tag,
            out_dir,
            channel,
            format,
            notes,
            platforms,
            version,
            token_env,
        }) => {
            context.info("Generating updater manifests");

            let request = ManifestRequest {
                owner,
                repo,
                tag,
                out_dir,
                channel: channel.parse::<Channel>()?,
                format: format.parse::<ManifestFormat>()?,
                notes,
                platforms,
                version,
                product_name: config.github.product_name.clone(),
            };
            let token = std::env::var(&token_env).ok().filter(|t| !t.is_empty());
            if token.is_none() {
                tracing::debug!("{} is not set, calling the GitHub API anonymously", token_env);
            }

            let client = GitHubClient::new(config.github.api_url.clone(), token)?;
            let written = ManifestGenerator::new(client).generate(&request).await?;
            for path in written {
                println!("{}", path.display());
            }
        }
        None => {
            println!("releasekit - Use --help for available commands");
            info!("CLI started without command");
        }
    }

    Ok(())
}
