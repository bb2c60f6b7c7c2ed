//! Release-tracking service seam and its `sentry-cli` implementation.
//!
//! The publish pipeline only talks to [`ReleaseService`]; [`SentryCli`] maps
//! each call onto one `sentry-cli` invocation.

use crate::error::{Result, ToolError};
use crate::inputs::{ORG_VAR, URL_VAR};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Projects every release record is associated with.
///
/// These names are part of the upload contract with Sentry.
pub const DEFAULT_PROJECTS: [&str; 2] = ["voicewise-web", "voicewise-desktop"];

pub const DEFAULT_PROGRAM: &str = "sentry-cli";
pub const DEFAULT_INSTALL_COMMAND: &str = "curl -sL https://sentry.io/get-cli/ | sh";

/// Operations the publish pipeline needs from the release-tracking service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseService: Send + Sync {
    /// Make sure the service's tooling is usable, installing it if needed
    async fn ensure_tool(&self) -> Result<()>;

    /// Whether a release record exists for `release`
    async fn release_exists(&self, release: &str) -> Result<bool>;

    /// Create the release record, associated with `projects`
    async fn create_release(&self, release: &str, projects: &[String]) -> Result<()>;

    /// Upload a directory of source maps for `release` / `dist`
    async fn upload_sourcemaps(&self, release: &str, dist: &str, dir: &Path) -> Result<()>;

    /// Upload a directory of native debug files
    async fn upload_debug_files(&self, dir: &Path) -> Result<()>;

    /// Mark the release record as finalized
    async fn finalize_release(&self, release: &str) -> Result<()>;
}

/// How to locate, install and authenticate `sentry-cli`
#[derive(Clone)]
pub struct SentryCliConfig {
    /// Program name or path
    pub program: String,
    /// Shell command run through `sh -c` when the program is absent
    pub install_command: String,
    pub auth_token: String,
    pub org: Option<String>,
    pub url: Option<String>,
}

impl SentryCliConfig {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            install_command: DEFAULT_INSTALL_COMMAND.to_string(),
            auth_token: auth_token.into(),
            org: None,
            url: None,
        }
    }

    /// Pick up the optional organization and server URL from `env`
    pub fn with_env(mut self, env: &HashMap<String, String>) -> Self {
        let value = |name: &str| env.get(name).filter(|v| !v.trim().is_empty()).cloned();
        self.org = value(ORG_VAR);
        self.url = value(URL_VAR);
        self
    }
}

impl std::fmt::Debug for SentryCliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryCliConfig")
            .field("program", &self.program)
            .field("install_command", &self.install_command)
            .field("auth_token", &"***")
            .field("org", &self.org)
            .field("url", &self.url)
            .finish()
    }
}

/// [`ReleaseService`] backed by the `sentry-cli` binary
#[derive(Debug, Clone)]
pub struct SentryCli {
    config: SentryCliConfig,
}

impl SentryCli {
    pub fn new(config: SentryCliConfig) -> Self {
        Self { config }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.config.program);
        command
            .args(args)
            .env("SENTRY_AUTH_TOKEN", &self.config.auth_token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(org) = &self.config.org {
            command.env("SENTRY_ORG", org);
        }
        if let Some(url) = &self.config.url {
            command.env("SENTRY_URL", url);
        }
        command
    }

    async fn output(&self, step: &str, args: Vec<OsString>) -> Result<Output> {
        debug!("Running {} {:?}", self.config.program, args);
        self.command(&args)
            .output()
            .await
            .map_err(|e| ToolError::spawn(&self.config.program, format!("{} ({})", e, step)).into())
    }

    /// Run one step and fail unless it exits successfully
    async fn run(&self, step: &str, args: Vec<OsString>) -> Result<()> {
        let output = self.output(step, args).await?;
        log_stdout(&output);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ToolError::command_failed(step, output.status.code(), stderr).into());
        }
        Ok(())
    }

    /// `program --version`; `Ok(None)` when the program cannot be found
    async fn installed_version(&self) -> Result<Option<String>> {
        match Command::new(&self.config.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            Ok(output) => Err(ToolError::command_failed(
                "version check",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim(),
            )
            .into()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ToolError::spawn(&self.config.program, e.to_string()).into()),
        }
    }

    async fn install(&self) -> Result<()> {
        info!("{} not found, installing", self.config.program);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.config.install_command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ToolError::InstallFailed {
                reason: format!("could not run installer: {}", e),
                code: None,
            })?;
        log_stdout(&output);
        if !output.status.success() {
            return Err(ToolError::InstallFailed {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                code: output.status.code(),
            }
            .into());
        }
        Ok(())
    }
}

fn log_stdout(output: &Output) {
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        if !line.trim().is_empty() {
            info!("  {}", line);
        }
    }
}

#[async_trait]
impl ReleaseService for SentryCli {
    async fn ensure_tool(&self) -> Result<()> {
        if let Some(version) = self.installed_version().await? {
            debug!("Using {}", version);
            return Ok(());
        }
        self.install().await?;
        match self.installed_version().await? {
            Some(version) => {
                info!("Installed {}", version);
                Ok(())
            }
            None => Err(ToolError::NotInstalled {
                program: self.config.program.clone(),
            }
            .into()),
        }
    }

    async fn release_exists(&self, release: &str) -> Result<bool> {
        let output = self
            .output("releases info", vec!["releases".into(), "info".into(), release.into()])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!("releases info {}: {}", release, stderr.trim());
            }
        }
        Ok(output.status.success())
    }

    async fn create_release(&self, release: &str, projects: &[String]) -> Result<()> {
        if projects.is_empty() {
            warn!("Creating release {} without any project", release);
        }
        let mut args: Vec<OsString> = vec!["releases".into(), "new".into(), release.into()];
        for project in projects {
            args.push("-p".into());
            args.push(project.into());
        }
        self.run("releases new", args).await
    }

    async fn upload_sourcemaps(&self, release: &str, dist: &str, dir: &Path) -> Result<()> {
        self.run(
            "sourcemaps upload",
            vec![
                "sourcemaps".into(),
                "upload".into(),
                "--release".into(),
                release.into(),
                "--dist".into(),
                dist.into(),
                dir.into(),
            ],
        )
        .await
    }

    async fn upload_debug_files(&self, dir: &Path) -> Result<()> {
        self.run(
            "debug-files upload",
            vec!["debug-files".into(), "upload".into(), dir.into()],
        )
        .await
    }

    async fn finalize_release(&self, release: &str) -> Result<()> {
        self.run(
            "releases finalize",
            vec!["releases".into(), "finalize".into(), release.into()],
        )
        .await
    }
}
