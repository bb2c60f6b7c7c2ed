//! Minimal GitHub releases client.

use crate::error::{NetworkError, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// One asset attached to a GitHub release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub name: String,
    /// API URL; downloading it with `application/octet-stream` returns the bytes
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub browser_download_url: String,
}

/// The subset of a GitHub release the manifest generator reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubRelease {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assets: Vec<ReleaseAsset>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GitHubRelease {
    /// `published_at`, falling back to `created_at` for unpublished drafts
    pub fn pub_date(&self) -> Option<&str> {
        self.published_at
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.created_at.as_deref().filter(|d| !d.is_empty()))
    }
}

/// Read access to releases and their assets
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("releasekit"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn get(&self, url: &str, accept: &'static str) -> reqwest::RequestBuilder {
        let request = self.http.get(url).header(ACCEPT, accept);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// `GET /repos/{owner}/{repo}/releases/tags/{tag}`
    pub async fn release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<GitHubRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.api_url, owner, repo, tag
        );
        tracing::debug!("Fetching {}", url);
        let response = self.get(&url, "application/vnd.github+json").send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<GitHubRelease>().await?)
    }

    /// Download an asset's raw bytes through its API URL
    pub async fn download_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        tracing::debug!("Downloading asset {}", asset.name);
        let response = self.get(&asset.url, "application/octet-stream").send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(NetworkError::http_request(status.as_u16(), format!("{} {}", url, body.trim())).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseKitError;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_release_by_tag_sends_github_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/voicewise/app/releases/tags/v1.2.3")
                    .header("accept", "application/vnd.github+json")
                    .header("x-github-api-version", "2022-11-28")
                    .header("authorization", "Bearer ghp_test");
                then.status(200).json_body(json!({
                    "tag_name": "v1.2.3",
                    "html_url": "https://github.com/voicewise/app/releases/tag/v1.2.3",
                    "published_at": "2026-10-01T12:00:00Z",
                    "assets": [
                        {"name": "VoiceWise_1.2.3_x64-setup.exe", "url": "u", "browser_download_url": "b"}
                    ]
                }));
            })
            .await;

        let client = GitHubClient::new(server.base_url(), Some("ghp_test".to_string())).unwrap();
        let release = client
            .release_by_tag("voicewise", "app", "v1.2.3")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(release.pub_date(), Some("2026-10-01T12:00:00Z"));
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].name, "VoiceWise_1.2.3_x64-setup.exe");
    }

    #[tokio::test]
    async fn test_missing_release_is_an_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/voicewise/app/releases/tags/v0.0.1");
                then.status(404).body(r#"{"message":"Not Found"}"#);
            })
            .await;

        let client = GitHubClient::new(server.base_url(), None).unwrap();
        let err = client
            .release_by_tag("voicewise", "app", "v0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReleaseKitError::Network(NetworkError::HttpRequest { status_code: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_download_asset_requests_octet_stream() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/assets/17")
                    .header("accept", "application/octet-stream");
                then.status(200).body("c2lnbmF0dXJl\n");
            })
            .await;

        let client = GitHubClient::new(server.base_url(), None).unwrap();
        let asset = ReleaseAsset {
            name: "app.tar.gz.sig".to_string(),
            url: server.url("/assets/17"),
            browser_download_url: String::new(),
        };
        let bytes = client.download_asset(&asset).await.unwrap();
        assert_eq!(bytes, b"c2lnbmF0dXJl\n");
    }

    #[test]
    fn test_null_assets_read_as_empty() {
        let release: GitHubRelease = serde_json::from_value(json!({
            "tag_name": "nightly",
            "published_at": "2026-10-03T00:00:00Z",
            "assets": null
        }))
        .unwrap();
        assert!(release.assets.is_empty());

        let release: GitHubRelease = serde_json::from_value(json!({"tag_name": "v1.0.0"})).unwrap();
        assert!(release.assets.is_empty());
    }

    #[test]
    fn test_pub_date_falls_back_to_created_at() {
        let release = GitHubRelease {
            tag_name: "nightly".to_string(),
            html_url: None,
            published_at: None,
            created_at: Some("2026-10-02T00:00:00Z".to_string()),
            assets: vec![],
        };
        assert_eq!(release.pub_date(), Some("2026-10-02T00:00:00Z"));
    }
}
