//! Debug artifact discovery.
//!
//! An artifact directory is "ready" when it holds at least one entry that
//! matches its category's filename pattern. Other files in the same directory
//! do not count, so a `dist/` holding only bundles and HTML is not ready for a
//! source map upload.

use crate::error::{ReleaseKitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use walkdir::WalkDir;

/// The two categories of debug artifacts attached to a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Web source maps (`*.map`)
    SourceMaps,
    /// Native debug symbols (`*.pdb` files, `*.dSYM` bundles)
    DebugSymbols,
}

impl ArtifactKind {
    /// Whether a single directory entry counts as an artifact of this kind
    pub fn matches(&self, name: &str, is_dir: bool) -> bool {
        match self {
            ArtifactKind::SourceMaps => !is_dir && name.ends_with(".map"),
            ArtifactKind::DebugSymbols => {
                if is_dir {
                    name.ends_with(".dSYM")
                } else {
                    name.ends_with(".pdb")
                }
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::SourceMaps => "source maps",
            ArtifactKind::DebugSymbols => "debug symbols",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Search `root` for the first artifact of `kind`.
///
/// A missing root is not an error, it simply holds no artifacts. The walk
/// stops at the first match; `.dSYM` bundles are not descended into.
pub fn find_first_artifact(root: &Path, kind: ArtifactKind) -> Result<Option<std::path::PathBuf>> {
    if !root.exists() {
        return Ok(None);
    }
    if !root.is_dir() {
        return Err(ReleaseKitError::validation(format!(
            "{} path is not a directory: {}",
            kind,
            root.display()
        )));
    }

    let mut walker = WalkDir::new(root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            ReleaseKitError::validation(format!("Failed to walk {}: {}", root.display(), e))
        })?;
        let is_dir = entry.file_type().is_dir();
        let (matched, is_bundle) = {
            let name = entry.file_name().to_string_lossy();
            (kind.matches(&name, is_dir), is_dir && name.ends_with(".dSYM"))
        };
        if matched {
            return Ok(Some(entry.into_path()));
        }
        if is_bundle {
            walker.skip_current_dir();
        }
    }

    Ok(None)
}

/// Whether `root` holds at least one artifact of `kind`
pub fn has_artifacts(root: &Path, kind: ArtifactKind) -> Result<bool> {
    Ok(find_first_artifact(root, kind)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pattern_matching() {
        assert!(ArtifactKind::SourceMaps.matches("main.js.map", false));
        assert!(ArtifactKind::SourceMaps.matches("index.css.map", false));
        assert!(!ArtifactKind::SourceMaps.matches("main.js", false));
        assert!(!ArtifactKind::SourceMaps.matches("assets.map", true));

        assert!(ArtifactKind::DebugSymbols.matches("voicewise.pdb", false));
        assert!(ArtifactKind::DebugSymbols.matches("VoiceWise.app.dSYM", true));
        assert!(!ArtifactKind::DebugSymbols.matches("voicewise.exe", false));
        assert!(!ArtifactKind::DebugSymbols.matches("voicewise.dSYM", false));
    }

    #[test]
    fn test_missing_directory_has_no_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(!has_artifacts(&missing, ArtifactKind::SourceMaps).unwrap());
    }

    #[test]
    fn test_empty_directory_has_no_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!has_artifacts(temp_dir.path(), ArtifactKind::SourceMaps).unwrap());
        assert!(!has_artifacts(temp_dir.path(), ArtifactKind::DebugSymbols).unwrap());
    }

    #[test]
    fn test_non_matching_files_do_not_count() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(temp_dir.path().join("main.js"), "console.log(1)").unwrap();

        assert!(!has_artifacts(temp_dir.path(), ArtifactKind::SourceMaps).unwrap());
    }

    #[test]
    fn test_nested_source_map_is_found() {
        let temp_dir = TempDir::new().unwrap();
        let assets = temp_dir.path().join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("index-abc123.js.map"), "{}").unwrap();

        let found = find_first_artifact(temp_dir.path(), ArtifactKind::SourceMaps).unwrap();
        assert_eq!(found, Some(assets.join("index-abc123.js.map")));
    }

    #[test]
    fn test_pdb_and_dsym_are_debug_symbols() {
        let pdb_dir = TempDir::new().unwrap();
        fs::write(pdb_dir.path().join("voicewise.pdb"), b"MSF").unwrap();
        assert!(has_artifacts(pdb_dir.path(), ArtifactKind::DebugSymbols).unwrap());

        let dsym_dir = TempDir::new().unwrap();
        fs::create_dir_all(dsym_dir.path().join("VoiceWise.dSYM/Contents")).unwrap();
        assert!(has_artifacts(dsym_dir.path(), ArtifactKind::DebugSymbols).unwrap());
    }

    #[test]
    fn test_file_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("dist");
        fs::write(&file, "not a dir").unwrap();
        assert!(has_artifacts(&file, ArtifactKind::SourceMaps).is_err());
    }
}
