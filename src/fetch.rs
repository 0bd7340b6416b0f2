//! Archive download and LZH unpacking
//!
//! Bulletins are published as one LZH archive per day and kind. The fetcher
//! keeps a fixed interval between requests and never downloads an archive
//! that is already on disk.

use chrono::NaiveDate;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::grammar::DocumentKind;
use crate::source::{archive_url, member_name};

/// Fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("broken archive {path:?}: {message}")]
    Archive { path: PathBuf, message: String },
}

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Delay between requests in milliseconds
    pub delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Reuse archives and bulletins already present in the destination
    pub skip_existing: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay_ms: 3000,
            timeout_secs: 30,
            max_retries: 3,
            skip_existing: true,
        }
    }
}

/// Where a bulletin came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Extracted bulletin was already present
    Present(PathBuf),
    /// Archive was on disk and has been unpacked
    Unpacked(PathBuf),
    Downloaded(PathBuf),
}

impl FetchOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FetchOutcome::Present(p) | FetchOutcome::Unpacked(p) | FetchOutcome::Downloaded(p) => p,
        }
    }
}

/// Archive file name, e.g. `k200915.lzh`
pub fn archive_name(date: NaiveDate, kind: DocumentKind) -> String {
    format!(
        "{}{}.lzh",
        kind.letter().to_ascii_lowercase(),
        date.format("%y%m%d")
    )
}

/// Rate-limited archive downloader
pub struct ArchiveFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    last_request: Mutex<Option<Instant>>,
}

impl ArchiveFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Wait for rate limit
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let delay = Duration::from_millis(self.config.delay_ms);

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries.max(1) {
            self.wait_for_rate_limit().await;

            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.bytes().await?.to_vec());
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    warn!("{} answered {} (attempt {})", url, status, attempt + 1);
                    // Missing days (no races held) are not retried
                    if status == 404 {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                    last_error = Some(FetchError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                Err(e) => {
                    warn!("Request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(FetchError::RequestFailed(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 0,
        }))
    }

    /// Make the bulletin of `date` and `kind` available in `dest_dir`
    pub async fn fetch(
        &self,
        date: NaiveDate,
        kind: DocumentKind,
        dest_dir: &Path,
    ) -> Result<FetchOutcome, FetchError> {
        let member = dest_dir.join(member_name(date, kind));
        if self.config.skip_existing && member.is_file() {
            debug!("{:?} already present", member);
            return Ok(FetchOutcome::Present(member));
        }

        fs::create_dir_all(dest_dir).map_err(|source| FetchError::Io {
            path: dest_dir.to_path_buf(),
            source,
        })?;

        let archive = dest_dir.join(archive_name(date, kind));
        let downloaded = !(self.config.skip_existing && archive.is_file());
        if downloaded {
            let url = archive_url(date, kind);
            info!("Downloading {}", url);
            let bytes = self.fetch_bytes(&url).await?;
            fs::write(&archive, bytes).map_err(|source| FetchError::Io {
                path: archive.clone(),
                source,
            })?;
        }

        unpack_archive(&archive, dest_dir)?;
        if downloaded {
            Ok(FetchOutcome::Downloaded(member))
        } else {
            Ok(FetchOutcome::Unpacked(member))
        }
    }

    /// Fetch both bulletins of one day
    pub async fn fetch_day(
        &self,
        date: NaiveDate,
        dest_dir: &Path,
    ) -> Result<Vec<FetchOutcome>, FetchError> {
        let mut outcomes = Vec::with_capacity(2);
        for kind in [DocumentKind::Result, DocumentKind::Schedule] {
            outcomes.push(self.fetch(date, kind, dest_dir).await?);
        }
        Ok(outcomes)
    }
}

/// Extract every member of an LZH archive into `dest_dir`
///
/// Member paths are flattened to their file names.
pub fn unpack_archive(archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let broken = |message: String| FetchError::Archive {
        path: archive.to_path_buf(),
        message,
    };

    let mut reader = delharc::parse_file(archive).map_err(|e| broken(e.to_string()))?;
    let mut written = Vec::new();

    loop {
        let header = reader.header();
        let pathname = header.parse_pathname();
        let is_directory = header.is_directory();

        match pathname.file_name() {
            Some(name) if !is_directory && reader.is_decoder_supported() => {
                let target = dest_dir.join(name);
                let mut file = File::create(&target).map_err(|source| FetchError::Io {
                    path: target.clone(),
                    source,
                })?;
                io::copy(&mut reader, &mut file).map_err(|source| FetchError::Io {
                    path: target.clone(),
                    source,
                })?;
                reader.crc_check().map_err(|e| broken(e.to_string()))?;
                debug!("Unpacked {:?}", target);
                written.push(target);
            }
            _ if is_directory => {}
            _ => warn!("Skipping {:?}: unsupported entry", pathname),
        }

        if !reader.next_file().map_err(|e| broken(e.to_string()))? {
            break;
        }
    }

    Ok(written)
}
