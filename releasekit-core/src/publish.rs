//! The release publishing pipeline.
//!
//! Steps run strictly in order: tool provisioning, release ensure, the two
//! conditional uploads, then finalization. The first failing step aborts the
//! run, so a failed upload leaves the release unfinalized.

use crate::artifacts::{ArtifactKind, find_first_artifact};
use crate::error::Result;
use crate::inputs::{DirectoryDefaults, PublishInputs};
use crate::logging::LogContext;
use crate::sentry::{DEFAULT_PROJECTS, ReleaseService};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// What the release ensure step did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    Created,
    AlreadyExisted,
}

/// Outcome of one conditional upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded,
    Skipped,
}

/// Summary of a completed publish run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub release: String,
    pub release_state: ReleaseState,
    pub sourcemaps: UploadOutcome,
    pub debug_symbols: UploadOutcome,
    pub finalized: bool,
}

/// Settings for a publish run that do not come from the environment
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Fallbacks for unset directory variables
    pub defaults: DirectoryDefaults,
    /// Overrides `SENTRY_SOURCEMAPS_DIR`
    pub sourcemaps_dir: Option<PathBuf>,
    /// Overrides `SENTRY_DEBUG_ROOT`
    pub debug_root: Option<PathBuf>,
    pub projects: Vec<String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            defaults: DirectoryDefaults::default(),
            sourcemaps_dir: None,
            debug_root: None,
            projects: DEFAULT_PROJECTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Resolve inputs from `env` and run a publish.
///
/// `connect` builds the release service from the resolved inputs; it is only
/// called once every required variable is present, so missing inputs fail
/// before anything external runs.
pub async fn publish_from_env<S, F>(
    env: &HashMap<String, String>,
    options: &PublishOptions,
    connect: F,
) -> Result<PublishReport>
where
    S: ReleaseService,
    F: FnOnce(&PublishInputs) -> S,
{
    let mut inputs = PublishInputs::from_env(env, &options.defaults)?;
    if let Some(dir) = &options.sourcemaps_dir {
        inputs.sourcemaps_dir = dir.clone();
    }
    if let Some(dir) = &options.debug_root {
        inputs.debug_root = dir.clone();
    }

    Publisher::new(connect(&inputs))
        .with_projects(options.projects.clone())
        .publish(&inputs)
        .await
}

/// Drives one publish run against a [`ReleaseService`]
pub struct Publisher<S: ReleaseService> {
    service: S,
    projects: Vec<String>,
}

impl<S: ReleaseService> Publisher<S> {
    /// Publisher using the fixed [`DEFAULT_PROJECTS`]
    pub fn new(service: S) -> Self {
        Self {
            service,
            projects: DEFAULT_PROJECTS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Replace the projects new releases are associated with
    pub fn with_projects(mut self, projects: Vec<String>) -> Self {
        self.projects = projects;
        self
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    pub async fn publish(&self, inputs: &PublishInputs) -> Result<PublishReport> {
        let context = LogContext::new("publish", "releasekit");
        self.run(inputs).instrument(context.span()).await
    }

    async fn run(&self, inputs: &PublishInputs) -> Result<PublishReport> {
        tracing::info!(release = %inputs.release, dist = %inputs.dist, "Publishing release");

        self.service.ensure_tool().await?;

        let release_state = self.ensure_release(&inputs.release).await?;

        let sourcemaps = self
            .upload_if_present(ArtifactKind::SourceMaps, &inputs.sourcemaps_dir, || {
                self.service
                    .upload_sourcemaps(&inputs.release, &inputs.dist, &inputs.sourcemaps_dir)
            })
            .await?;

        let debug_symbols = self
            .upload_if_present(ArtifactKind::DebugSymbols, &inputs.debug_root, || {
                self.service.upload_debug_files(&inputs.debug_root)
            })
            .await?;

        tracing::info!("Finalizing release {}", inputs.release);
        self.service.finalize_release(&inputs.release).await?;

        tracing::info!("Release {} published", inputs.release);
        Ok(PublishReport {
            release: inputs.release.clone(),
            release_state,
            sourcemaps,
            debug_symbols,
            finalized: true,
        })
    }

    /// Create the release record unless it already exists
    pub async fn ensure_release(&self, release: &str) -> Result<ReleaseState> {
        if self.service.release_exists(release).await? {
            tracing::info!("Release {} already exists", release);
            return Ok(ReleaseState::AlreadyExisted);
        }
        tracing::info!(
            "Creating release {} for projects {}",
            release,
            self.projects.join(", ")
        );
        self.service.create_release(release, &self.projects).await?;
        Ok(ReleaseState::Created)
    }

    async fn upload_if_present<F, Fut>(
        &self,
        kind: ArtifactKind,
        dir: &Path,
        upload: F,
    ) -> Result<UploadOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        match find_first_artifact(dir, kind)? {
            Some(first) => {
                tracing::info!(
                    "Uploading {} from {} (found {})",
                    kind,
                    dir.display(),
                    first.display()
                );
                upload().await?;
                Ok(UploadOutcome::Uploaded)
            }
            None => {
                tracing::info!("No {} found in {}, skipping upload", kind, dir.display());
                Ok(UploadOutcome::Skipped)
            }
        }
    }
}
