pub mod error;
pub mod logging;
pub mod inputs;
pub mod artifacts;
pub mod sentry;
pub mod publish;
pub mod github;
pub mod manifest;

pub use error::{Result, ReleaseKitError, ToolError, ManifestError, NetworkError};
pub use logging::{LogConfig, LogContext, CorrelationId, init_logging, init_cli_logging, LogFormat};
pub use inputs::{
    PublishInputs, DirectoryDefaults, capture_env, DEFAULT_SOURCEMAPS_DIR, DEFAULT_DEBUG_ROOT,
    REQUIRED_VARS
};
pub use artifacts::{ArtifactKind, find_first_artifact, has_artifacts};
pub use sentry::{ReleaseService, SentryCli, SentryCliConfig, DEFAULT_PROJECTS};
pub use publish::{
    Publisher, PublishOptions, PublishReport, ReleaseState, UploadOutcome, publish_from_env
};
pub use github::{GitHubClient, GitHubRelease, ReleaseAsset};
pub use manifest::{
    Channel, ManifestFormat, ManifestGenerator, ManifestRequest, UpdaterManifest,
    PlatformEntry, UpdateTarget, default_targets, write_manifests
};
