//! Publish inputs and the precondition check.
//!
//! Inputs come from a captured environment map rather than the live process
//! environment, so the check can run against any set of variables.

use crate::error::{ReleaseKitError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub const AUTH_TOKEN_VAR: &str = "SENTRY_AUTH_TOKEN";
pub const RELEASE_VAR: &str = "SENTRY_RELEASE";
pub const DIST_VAR: &str = "SENTRY_DIST";
pub const SOURCEMAPS_DIR_VAR: &str = "SENTRY_SOURCEMAPS_DIR";
pub const DEBUG_ROOT_VAR: &str = "SENTRY_DEBUG_ROOT";
pub const ORG_VAR: &str = "SENTRY_ORG";
pub const URL_VAR: &str = "SENTRY_URL";

pub const DEFAULT_SOURCEMAPS_DIR: &str = "dist";
pub const DEFAULT_DEBUG_ROOT: &str = "src-tauri/target/release";

/// Variables that must be present before any external call is made
pub const REQUIRED_VARS: [&str; 3] = [AUTH_TOKEN_VAR, RELEASE_VAR, DIST_VAR];

/// Collect the variables the publish run cares about from the process environment.
pub fn capture_env() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("SENTRY_"))
        .collect()
}

/// Resolved inputs for one publish run
#[derive(Clone, PartialEq, Eq)]
pub struct PublishInputs {
    pub auth_token: String,
    pub release: String,
    pub dist: String,
    pub sourcemaps_dir: PathBuf,
    pub debug_root: PathBuf,
}

impl fmt::Debug for PublishInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishInputs")
            .field("auth_token", &"***")
            .field("release", &self.release)
            .field("dist", &self.dist)
            .field("sourcemaps_dir", &self.sourcemaps_dir)
            .field("debug_root", &self.debug_root)
            .finish()
    }
}

/// Fallback directories used when the optional variables are unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDefaults {
    pub sourcemaps_dir: PathBuf,
    pub debug_root: PathBuf,
}

impl Default for DirectoryDefaults {
    fn default() -> Self {
        Self {
            sourcemaps_dir: PathBuf::from(DEFAULT_SOURCEMAPS_DIR),
            debug_root: PathBuf::from(DEFAULT_DEBUG_ROOT),
        }
    }
}

impl PublishInputs {
    /// Validate required variables and resolve the optional directories.
    ///
    /// Empty values count as missing. Every missing name is reported in a
    /// single error.
    pub fn from_env(env: &HashMap<String, String>, defaults: &DirectoryDefaults) -> Result<Self> {
        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|name| non_empty(env, name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ReleaseKitError::MissingInputs { names: missing });
        }

        let required = |name: &str| {
            non_empty(env, name)
                .map(str::to_string)
                .ok_or_else(|| ReleaseKitError::internal(format!("{} vanished after check", name)))
        };

        Ok(Self {
            auth_token: required(AUTH_TOKEN_VAR)?,
            release: required(RELEASE_VAR)?,
            dist: required(DIST_VAR)?,
            sourcemaps_dir: non_empty(env, SOURCEMAPS_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| defaults.sourcemaps_dir.clone()),
            debug_root: non_empty(env, DEBUG_ROOT_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| defaults.debug_root.clone()),
        })
    }
}

fn non_empty<'a>(env: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    env.get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_all_required_present_uses_default_dirs() {
        let inputs = PublishInputs::from_env(
            &env(&[
                ("SENTRY_AUTH_TOKEN", "t"),
                ("SENTRY_RELEASE", "v1.2.3"),
                ("SENTRY_DIST", "42"),
            ]),
            &DirectoryDefaults::default(),
        )
        .unwrap();

        assert_eq!(inputs.auth_token, "t");
        assert_eq!(inputs.release, "v1.2.3");
        assert_eq!(inputs.dist, "42");
        assert_eq!(inputs.sourcemaps_dir, PathBuf::from("dist"));
        assert_eq!(inputs.debug_root, PathBuf::from("src-tauri/target/release"));
    }

    #[test]
    fn test_optional_dirs_override_defaults() {
        let inputs = PublishInputs::from_env(
            &env(&[
                ("SENTRY_AUTH_TOKEN", "t"),
                ("SENTRY_RELEASE", "v1.2.3"),
                ("SENTRY_DIST", "42"),
                ("SENTRY_SOURCEMAPS_DIR", "web/build"),
                ("SENTRY_DEBUG_ROOT", "target/x86_64-pc-windows-msvc/release"),
            ]),
            &DirectoryDefaults::default(),
        )
        .unwrap();

        assert_eq!(inputs.sourcemaps_dir, PathBuf::from("web/build"));
        assert_eq!(
            inputs.debug_root,
            PathBuf::from("target/x86_64-pc-windows-msvc/release")
        );
    }

    #[test]
    fn test_every_missing_variable_is_reported() {
        let err = PublishInputs::from_env(
            &env(&[("SENTRY_RELEASE", "v1.2.3")]),
            &DirectoryDefaults::default(),
        )
        .unwrap_err();

        match err {
            ReleaseKitError::MissingInputs { names } => {
                assert_eq!(names, vec!["SENTRY_AUTH_TOKEN", "SENTRY_DIST"]);
            }
            other => panic!("Expected MissingInputs, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = PublishInputs::from_env(
            &env(&[
                ("SENTRY_AUTH_TOKEN", "  "),
                ("SENTRY_RELEASE", "v1.2.3"),
                ("SENTRY_DIST", "42"),
            ]),
            &DirectoryDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReleaseKitError::MissingInputs { ref names } if names == &["SENTRY_AUTH_TOKEN"]));
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let inputs = PublishInputs::from_env(
            &env(&[
                ("SENTRY_AUTH_TOKEN", "sntrys_secret"),
                ("SENTRY_RELEASE", "v1.2.3"),
                ("SENTRY_DIST", "42"),
            ]),
            &DirectoryDefaults::default(),
        )
        .unwrap();
        let rendered = format!("{inputs:?}");
        assert!(!rendered.contains("sntrys_secret"));
        assert!(rendered.contains("v1.2.3"));
    }
}
