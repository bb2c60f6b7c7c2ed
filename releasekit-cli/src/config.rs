//! Configuration management for the releasekit CLI.
//!
//! This module handles loading configuration from files, environment variables,
//! and command line arguments, with appropriate precedence.

use anyhow::{Context, bail};
use releasekit_core::DirectoryDefaults;
use releasekit_core::github::DEFAULT_API_URL;
use releasekit_core::manifest::DEFAULT_PRODUCT_NAME;
use releasekit_core::sentry::{DEFAULT_INSTALL_COMMAND, DEFAULT_PROGRAM, DEFAULT_PROJECTS};
use releasekit_core::{DEFAULT_DEBUG_ROOT, DEFAULT_SOURCEMAPS_DIR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = ".releasekit.toml";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// sentry-cli configuration
    #[serde(default)]
    pub sentry: SentryConfig,

    /// Artifact directory defaults
    #[serde(default)]
    pub publish: PublishConfig,

    /// GitHub configuration for manifest generation
    #[serde(default)]
    pub github: GitHubConfig,
}

/// sentry-cli configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Program name or path
    #[serde(default = "default_program")]
    pub program: String,

    /// Shell command that installs the program when it is missing
    #[serde(default = "default_install_command")]
    pub install_command: String,

    /// Projects new releases are associated with
    #[serde(default = "default_projects")]
    pub projects: Vec<String>,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            install_command: default_install_command(),
            projects: default_projects(),
        }
    }
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_install_command() -> String {
    DEFAULT_INSTALL_COMMAND.to_string()
}

fn default_projects() -> Vec<String> {
    DEFAULT_PROJECTS.iter().map(|p| p.to_string()).collect()
}

/// Artifact directory defaults, used when the matching env var is unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_sourcemaps_dir")]
    pub sourcemaps_dir: PathBuf,

    #[serde(default = "default_debug_root")]
    pub debug_root: PathBuf,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            sourcemaps_dir: default_sourcemaps_dir(),
            debug_root: default_debug_root(),
        }
    }
}

fn default_sourcemaps_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCEMAPS_DIR)
}

fn default_debug_root() -> PathBuf {
    PathBuf::from(DEFAULT_DEBUG_ROOT)
}

impl PublishConfig {
    pub fn directory_defaults(&self) -> DirectoryDefaults {
        DirectoryDefaults {
            sourcemaps_dir: self.sourcemaps_dir.clone(),
            debug_root: self.debug_root.clone(),
        }
    }
}

/// GitHub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Product name used in default release notes
    #[serde(default = "default_product_name")]
    pub product_name: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            product_name: default_product_name(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_product_name() -> String {
    DEFAULT_PRODUCT_NAME.to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Command line arguments (handled by Clap)
    /// 2. Environment variables
    /// 3. Configuration file
    /// 4. Default values
    pub fn load() -> anyhow::Result<Self> {
        let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        let mut config = if config_path.exists() {
            match Config::from_file(&config_path) {
                Ok(file_config) => file_config,
                Err(e) => {
                    tracing::warn!("Failed to load config file: {:#}", e);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `RELEASEKIT_*` variables found through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup("RELEASEKIT_SENTRY_CLI") {
            self.sentry.program = program;
        }

        if let Some(install_command) = lookup("RELEASEKIT_INSTALL_COMMAND") {
            self.sentry.install_command = install_command;
        }

        if let Some(api_url) = lookup("RELEASEKIT_GITHUB_API_URL") {
            self.github.api_url = api_url;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sentry.program.trim().is_empty() {
            bail!("sentry.program cannot be empty");
        }

        if self.sentry.projects.is_empty() || self.sentry.projects.iter().any(|p| p.trim().is_empty()) {
            bail!("sentry.projects must list at least one non-empty project");
        }

        if !self.github.api_url.starts_with("http://") && !self.github.api_url.starts_with("https://") {
            bail!("Invalid GitHub API URL: must start with http:// or https://");
        }

        Ok(())
    }

    /// Load from `path` when given, otherwise from the default location, then validate
    pub fn load_and_validate(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.apply_env_overrides(|key| std::env::var(key).ok());
                config
            }
            None => Self::load()?,
        };
        config.validate()?;
        Ok(config)
    }
}
