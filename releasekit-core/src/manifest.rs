//! Updater manifest generation.
//!
//! Reads the assets of a GitHub release, picks the updater bundle and its
//! detached signature for each supported target, and writes the JSON
//! documents the desktop updater polls.
//!
//! File naming: the combined document is `latest.json`; per-platform
//! documents are `latest-<os>-<arch>.json`. Channels live in separate output
//! directories.

use crate::error::{ManifestError, ReleaseKitError, Result};
use crate::github::{GitHubClient, GitHubRelease, ReleaseAsset};
use crate::logging::LogContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Instrument;

pub const COMBINED_FILE_NAME: &str = "latest.json";
pub const DEFAULT_PRODUCT_NAME: &str = "VoiceWise";

/// Update channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Nightly,
}

impl Channel {
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Stable => "Stable",
            Channel::Nightly => "Nightly",
        }
    }

    /// Stable accepts `vX.Y.Z` only; nightly also takes a pre-release or
    /// build suffix, or the literal `nightly`.
    pub fn validate_tag(&self, tag: &str) -> Result<()> {
        let (pattern, expected) = match self {
            Channel::Stable => (r"^v[0-9]+\.[0-9]+\.[0-9]+$", "stable tag vX.Y.Z"),
            Channel::Nightly if tag == "nightly" => return Ok(()),
            Channel::Nightly => (
                r"^v[0-9]+\.[0-9]+\.[0-9]+(?:[-+][0-9A-Za-z.-]+)?$",
                "nightly tag vX.Y.Z(-pre)?(+meta)? or 'nightly'",
            ),
        };
        if compile(pattern)?.is_match(tag) {
            Ok(())
        } else {
            Err(ManifestError::InvalidTag {
                channel: self.to_string(),
                expected: expected.to_string(),
                tag: tag.to_string(),
            }
            .into())
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stable => f.write_str("stable"),
            Channel::Nightly => f.write_str("nightly"),
        }
    }
}

impl FromStr for Channel {
    type Err = ReleaseKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stable" => Ok(Channel::Stable),
            "nightly" => Ok(Channel::Nightly),
            other => Err(ManifestError::UnknownVariant {
                kind: "channel".to_string(),
                value: other.to_string(),
            }
            .into()),
        }
    }
}

/// Output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestFormat {
    /// One `latest.json` holding every platform
    Combined,
    /// One `latest-<os>-<arch>.json` per platform
    PerPlatform,
}

impl FromStr for ManifestFormat {
    type Err = ReleaseKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "combined" => Ok(ManifestFormat::Combined),
            "per-platform" => Ok(ManifestFormat::PerPlatform),
            other => Err(ManifestError::UnknownVariant {
                kind: "format".to_string(),
                value: other.to_string(),
            }
            .into()),
        }
    }
}

/// A platform the updater serves, and the asset-name spellings it may appear under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    pub os_target: &'static str,
    pub arch_canonical: &'static str,
    pub platform_aliases: &'static [&'static str],
    pub arch_aliases: &'static [&'static str],
    pub extensions: &'static [&'static str],
}

impl UpdateTarget {
    /// Manifest key, e.g. `darwin-aarch64`
    pub fn key(&self) -> String {
        format!("{}-{}", self.os_target, self.arch_canonical)
    }
}

pub fn default_targets() -> Vec<UpdateTarget> {
    vec![
        UpdateTarget {
            os_target: "darwin",
            arch_canonical: "aarch64",
            platform_aliases: &["macos", "darwin"],
            arch_aliases: &["aarch64", "arm64"],
            extensions: &[".app.tar.gz", ".tar.gz"],
        },
        UpdateTarget {
            os_target: "darwin",
            arch_canonical: "x86_64",
            platform_aliases: &["macos", "darwin"],
            arch_aliases: &["x86_64", "x64"],
            extensions: &[".app.tar.gz", ".tar.gz"],
        },
        UpdateTarget {
            os_target: "windows",
            arch_canonical: "x86_64",
            platform_aliases: &["windows"],
            arch_aliases: &["x86_64", "x64"],
            extensions: &[".exe"],
        },
    ]
}

/// Keep only the targets named in a comma-separated `os-arch` list.
///
/// A blank filter keeps everything; a filter that keeps nothing is an error.
pub fn filter_targets(targets: Vec<UpdateTarget>, filter: Option<&str>) -> Result<Vec<UpdateTarget>> {
    let Some(filter) = filter.filter(|f| !f.trim().is_empty()) else {
        return Ok(targets);
    };
    let wanted: Vec<&str> = filter
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let kept: Vec<UpdateTarget> = targets
        .into_iter()
        .filter(|t| wanted.contains(&t.key().as_str()))
        .collect();
    if kept.is_empty() {
        return Err(ManifestError::NoTargetsMatched {
            filter: filter.to_string(),
        }
        .into());
    }
    Ok(kept)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| ReleaseKitError::internal(format!("Bad asset pattern {}: {}", pattern, e)))
}

fn alternation(aliases: &[&str]) -> String {
    aliases
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|")
}

fn pick_one<'a>(items: Vec<&'a ReleaseAsset>, description: String) -> Result<&'a ReleaseAsset> {
    match items.as_slice() {
        [only] => Ok(*only),
        [] => Err(ManifestError::missing_asset(description).into()),
        _ => {
            let mut names: Vec<&str> = items.iter().map(|a| a.name.as_str()).collect();
            names.sort_unstable();
            Err(ManifestError::AmbiguousAsset {
                description,
                candidates: names.join(", "),
            }
            .into())
        }
    }
}

/// The single updater bundle named `<product>_<version>_<platform>_<arch>...<ext>`
pub fn find_updater_asset<'a>(
    assets: &'a [ReleaseAsset],
    version: &str,
    platform_aliases: &[&str],
    arch: &str,
    extension: &str,
) -> Result<&'a ReleaseAsset> {
    let pattern = compile(&format!(
        r"^.+_{}_({})_{}.*{}$",
        regex::escape(version),
        alternation(platform_aliases),
        regex::escape(arch),
        regex::escape(extension)
    ))?;
    let candidates = assets.iter().filter(|a| pattern.is_match(&a.name)).collect();
    pick_one(
        candidates,
        format!(
            "version={} platform=[{}] arch={} ext={}",
            version,
            platform_aliases.join(", "),
            arch,
            extension
        ),
    )
}

/// The detached signature belonging to `updater_asset_name`.
///
/// An exact `<name>.sig` wins. Otherwise any `.sig` for the same
/// version/platform/arch is considered, preferring names that contain the
/// updater asset name.
pub fn find_signature_asset<'a>(
    assets: &'a [ReleaseAsset],
    version: &str,
    platform_aliases: &[&str],
    arch: &str,
    updater_asset_name: &str,
) -> Result<&'a ReleaseAsset> {
    let exact_name = format!("{}.sig", updater_asset_name);
    let exact: Vec<&ReleaseAsset> = assets.iter().filter(|a| a.name == exact_name).collect();
    if !exact.is_empty() {
        return pick_one(exact, format!("signature for {}", updater_asset_name));
    }

    let pattern = compile(&format!(
        r"^.+_{}_({})_{}.*\.sig$",
        regex::escape(version),
        alternation(platform_aliases),
        regex::escape(arch)
    ))?;
    let candidates: Vec<&ReleaseAsset> =
        assets.iter().filter(|a| pattern.is_match(&a.name)).collect();

    if candidates.len() <= 1 {
        return pick_one(
            candidates,
            format!(
                "signature for version={} platform=[{}] arch={}",
                version,
                platform_aliases.join(", "),
                arch
            ),
        );
    }

    let any_related = candidates
        .iter()
        .any(|a| a.name.contains(updater_asset_name));
    let tied = candidates
        .into_iter()
        .filter(|a| a.name.contains(updater_asset_name) == any_related)
        .collect();
    pick_one(tied, format!("signature for {}", updater_asset_name))
}

/// Updater bundle and signature chosen for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAssets<'a> {
    pub key: String,
    pub updater: &'a ReleaseAsset,
    pub signature: &'a ReleaseAsset,
}

/// Choose the assets for each target.
///
/// A target without an updater bundle is skipped with a warning; a bundle
/// without a usable signature is an error.
pub fn select_assets<'a>(
    assets: &'a [ReleaseAsset],
    version: &str,
    targets: &[UpdateTarget],
) -> Result<Vec<SelectedAssets<'a>>> {
    let mut selected = Vec::new();
    for target in targets {
        let mut last_error = None;
        let mut found = None;
        'aliases: for arch in target.arch_aliases {
            for ext in target.extensions {
                match find_updater_asset(assets, version, target.platform_aliases, arch, ext) {
                    Ok(asset) => {
                        found = Some((asset, *arch));
                        break 'aliases;
                    }
                    Err(e) => last_error = Some(e),
                }
            }
        }

        let Some((updater, arch)) = found else {
            tracing::warn!(
                "Skipping {}: {}",
                target.key(),
                last_error.map_or_else(|| "no matching asset".to_string(), |e| e.to_string())
            );
            continue;
        };

        let signature =
            find_signature_asset(assets, version, target.platform_aliases, arch, &updater.name)?;
        selected.push(SelectedAssets {
            key: target.key(),
            updater,
            signature,
        });
    }
    Ok(selected)
}

/// One platform entry of an updater manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    pub signature: String,
    pub url: String,
}

/// The document the desktop updater downloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterManifest {
    pub version: String,
    pub pub_date: String,
    pub platforms: BTreeMap<String, PlatformEntry>,
    pub notes: String,
}

impl UpdaterManifest {
    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)? + "\n")
    }

    /// Copy of this manifest restricted to one platform
    pub fn for_platform(&self, key: &str) -> Option<UpdaterManifest> {
        self.platforms.get(key).map(|entry| UpdaterManifest {
            version: self.version.clone(),
            pub_date: self.pub_date.clone(),
            platforms: BTreeMap::from([(key.to_string(), entry.clone())]),
            notes: self.notes.clone(),
        })
    }
}

/// File name for a per-platform manifest
pub fn platform_file_name(key: &str) -> String {
    format!("latest-{}.json", key)
}

/// Write `manifest` into `out_dir` using `format`; returns the written paths.
pub fn write_manifests(
    manifest: &UpdaterManifest,
    out_dir: &Path,
    format: ManifestFormat,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();
    match format {
        ManifestFormat::Combined => {
            let path = out_dir.join(COMBINED_FILE_NAME);
            std::fs::write(&path, manifest.to_json()?)?;
            written.push(path);
        }
        ManifestFormat::PerPlatform => {
            for key in manifest.platforms.keys() {
                if let Some(single) = manifest.for_platform(key) {
                    let path = out_dir.join(platform_file_name(key));
                    std::fs::write(&path, single.to_json()?)?;
                    written.push(path);
                }
            }
        }
    }
    Ok(written)
}

/// Version string without a leading `v`
pub fn resolve_version(tag: &str, explicit: Option<&str>) -> String {
    let raw = explicit.filter(|v| !v.is_empty()).unwrap_or(tag);
    raw.strip_prefix('v').unwrap_or(raw).to_string()
}

/// Release notes used when none are given
pub fn default_notes(product_name: &str, version: &str, channel: Channel, html_url: &str) -> String {
    format!(
        "{} v{}（{}）\n\n更新说明请查看：{}",
        product_name,
        version,
        channel.label(),
        html_url
    )
    .trim()
    .to_string()
}

/// Everything needed to produce the manifests for one release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRequest {
    pub owner: String,
    pub repo: String,
    pub tag: String,
    pub out_dir: PathBuf,
    pub channel: Channel,
    pub format: ManifestFormat,
    pub notes: Option<String>,
    /// Comma-separated `os-arch` keys
    pub platforms: Option<String>,
    /// Overrides the version derived from the tag
    pub version: Option<String>,
    pub product_name: String,
}

/// Builds updater manifests from GitHub releases
pub struct ManifestGenerator {
    client: GitHubClient,
    targets: Vec<UpdateTarget>,
}

impl ManifestGenerator {
    pub fn new(client: GitHubClient) -> Self {
        Self {
            client,
            targets: default_targets(),
        }
    }

    /// Fetch the release and assemble its manifest without writing anything
    pub async fn build(&self, request: &ManifestRequest) -> Result<UpdaterManifest> {
        request.channel.validate_tag(&request.tag)?;
        let targets = filter_targets(self.targets.clone(), request.platforms.as_deref())?;

        let release = self
            .client
            .release_by_tag(&request.owner, &request.repo, &request.tag)
            .await?;
        let pub_date = release
            .pub_date()
            .ok_or_else(|| ManifestError::invalid_release("release missing published_at/created_at"))?
            .to_string();

        let version = resolve_version(&request.tag, request.version.as_deref());
        let notes = self.notes_for(request, &release, &version);

        let mut platforms = BTreeMap::new();
        for selected in select_assets(&release.assets, &version, &targets)? {
            let bytes = self.client.download_asset(selected.signature).await?;
            let signature = String::from_utf8_lossy(&bytes).trim().to_string();
            platforms.insert(
                selected.key,
                PlatformEntry {
                    signature,
                    url: selected.updater.browser_download_url.clone(),
                },
            );
        }

        if platforms.is_empty() {
            return Err(ManifestError::NoPlatformAssets.into());
        }

        Ok(UpdaterManifest {
            version,
            pub_date,
            platforms,
            notes,
        })
    }

    /// Build and write the manifests; returns the written paths
    pub async fn generate(&self, request: &ManifestRequest) -> Result<Vec<PathBuf>> {
        let context = LogContext::new("manifest", "releasekit");
        async {
            let manifest = self.build(request).await?;
            let written = write_manifests(&manifest, &request.out_dir, request.format)?;
            let keys: Vec<&str> = manifest.platforms.keys().map(String::as_str).collect();
            for path in &written {
                tracing::info!("Wrote {} with platforms: {}", path.display(), keys.join(", "));
            }
            Ok::<_, ReleaseKitError>(written)
        }
        .instrument(context.span())
        .await
    }

    fn notes_for(&self, request: &ManifestRequest, release: &GitHubRelease, version: &str) -> String {
        let given = request.notes.as_deref().unwrap_or_default().trim();
        if !given.is_empty() {
            return given.to_string();
        }
        default_notes(
            &request.product_name,
            version,
            request.channel,
            release.html_url.as_deref().unwrap_or_default(),
        )
    }
}
