//! Release checking and artefact download progress.
//!
//! The feed itself sits behind [`ReleaseFeed`] so the checker's behaviour
//! is testable without the network. Progress is reported through the
//! supervisor's event broadcast via the staged
//! [`DownloadStage`](bosun_kernel::DownloadStage) values.

use std::fs::File;
use std::io::{Read, Write};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use bosun_kernel::{DownloadStage, StatusEvent};

const UPDATE_TARGET: &str = "bosund::update";

/// Timeout applied to release feed requests.
const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent presented to the release feed.
const FEED_USER_AGENT: &str = "bosun";

/// One release advertised by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Version string, without a leading `v`.
    pub version: String,
    /// Artefact download location.
    pub download_url: String,
}

/// Errors raised while checking for or fetching releases.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The feed request failed.
    #[error("release feed request failed: {source}")]
    Feed {
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// The feed response was missing required fields.
    #[error("malformed release feed response: {0}")]
    Malformed(String),
    /// Writing the downloaded artefact failed.
    #[error("failed to store downloaded artefact: {source}")]
    Io {
        /// Underlying IO error.
        #[from]
        source: std::io::Error,
    },
}

/// Behaviour required from release feeds.
pub trait ReleaseFeed: Send {
    /// Returns the latest advertised release.
    fn latest(&self) -> Result<ReleaseInfo, UpdateError>;
}

/// Release feed backed by a GitHub releases endpoint.
#[derive(Debug)]
pub struct GithubReleaseFeed {
    url: Url,
    http: reqwest::blocking::Client,
}

impl GithubReleaseFeed {
    /// Builds a feed against the configured releases endpoint.
    pub fn new(url: Url) -> Result<Self, UpdateError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(FEED_USER_AGENT)
            .timeout(FEED_TIMEOUT)
            .build()
            .map_err(|source| UpdateError::Feed { source })?;
        Ok(Self { url, http })
    }
}

impl ReleaseFeed for GithubReleaseFeed {
    fn latest(&self) -> Result<ReleaseInfo, UpdateError> {
        let payload: Value = self
            .http
            .get(self.url.clone())
            .send()
            .map_err(|source| UpdateError::Feed { source })?
            .json()
            .map_err(|source| UpdateError::Feed { source })?;
        parse_release(&payload)
    }
}

/// Extracts a release from a GitHub releases payload.
fn parse_release(payload: &Value) -> Result<ReleaseInfo, UpdateError> {
    let version = payload
        .get("tag_name")
        .and_then(Value::as_str)
        .map(|tag| tag.trim_start_matches('v').to_owned())
        .ok_or_else(|| UpdateError::Malformed("no tag_name".to_owned()))?;

    let assets = payload
        .get("assets")
        .and_then(Value::as_array)
        .ok_or_else(|| UpdateError::Malformed("no assets".to_owned()))?;

    let download_url = assets
        .iter()
        .filter_map(|asset| {
            let name = asset.get("name").and_then(Value::as_str)?;
            if name.ends_with(".tar.gz") || name.ends_with(".zip") {
                asset
                    .get("browser_download_url")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            } else {
                None
            }
        })
        .next()
        .ok_or_else(|| UpdateError::Malformed("no downloadable asset".to_owned()))?;

    Ok(ReleaseInfo {
        version,
        download_url,
    })
}

/// Checks the feed, returning the release when it differs from
/// `current_version`.
pub fn check_for_update(
    feed: &dyn ReleaseFeed,
    current_version: &str,
) -> Result<Option<ReleaseInfo>, UpdateError> {
    let release = feed.latest()?;
    if release.version == current_version {
        debug!(
            target: UPDATE_TARGET,
            version = %release.version,
            "already on the latest release"
        );
        return Ok(None);
    }
    info!(
        target: UPDATE_TARGET,
        current = current_version,
        latest = %release.version,
        "newer release available"
    );
    Ok(Some(release))
}

/// Fetches a release artefact, publishing staged progress events.
pub fn download_artefact(
    release: &ReleaseInfo,
    destination: &camino::Utf8Path,
    mut publish: impl FnMut(StatusEvent),
) -> Result<(), UpdateError> {
    publish(progress(DownloadStage::Found, 0, format!(
        "Fetching release {}",
        release.version
    )));

    let http = reqwest::blocking::Client::builder()
        .user_agent(FEED_USER_AGENT)
        .build()
        .map_err(|source| UpdateError::Feed { source })?;
    let mut response = http
        .get(&release.download_url)
        .send()
        .map_err(|source| UpdateError::Feed { source })?;

    let total = response.content_length().unwrap_or(0);
    let mut file = File::create(destination)?;
    let mut fetched: u64 = 0;
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = response
            .read(&mut buffer)
            .map_err(|source| UpdateError::Io {
                source,
            })?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        fetched = fetched.saturating_add(read as u64);
        publish(progress(
            DownloadStage::Downloading,
            percent_of(fetched, total),
            format!("Downloading {}", release.version),
        ));
    }
    file.sync_all()?;

    publish(progress(DownloadStage::Completed, 100, format!(
        "Release {} downloaded",
        release.version
    )));
    Ok(())
}

fn progress(stage: DownloadStage, percent: u8, message: String) -> StatusEvent {
    StatusEvent::DownloadProgress {
        stage,
        percent,
        message,
    }
}

fn percent_of(fetched: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = fetched.saturating_mul(100) / total;
    u8::try_from(ratio.min(100)).unwrap_or(100)
}
