use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::checksum::StreamingHasher;
use crate::core::error::{SyncError, SyncResult};
use crate::core::http::{build_download_client, transport_error};
use crate::core::mods::config::SyncSettings;
use crate::core::mods::model::Checksum;

/// Per-file progress; only produced when the server declares a content length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub percent: u8,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub bytes_written: u64,
    /// URL the body was finally served from, after redirects.
    pub final_url: String,
}

/// Streams remote artifacts straight to their destination.
///
/// Any failure (status, transport, write, checksum, timeout) removes the
/// destination file so a truncated jar is never mistaken for an install.
pub struct ArtifactFetcher {
    client: Client,
    /// Wall-clock bound for one fetch, redirects included.
    timeout: Duration,
    max_redirects: usize,
}

impl ArtifactFetcher {
    pub fn new(client: Client, timeout: Duration, max_redirects: usize) -> Self {
        Self {
            client,
            timeout,
            max_redirects,
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> SyncResult<Self> {
        Ok(Self::new(
            build_download_client(settings)?,
            Duration::from_secs(settings.download_timeout_secs),
            settings.max_redirects,
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Download `url` into `dest`, verifying `checksum` when given.
    pub async fn fetch<F>(
        &self,
        url: &str,
        dest: &Path,
        checksum: Option<&Checksum>,
        mut on_progress: F,
    ) -> SyncResult<FetchReport>
    where
        F: FnMut(FetchProgress) + Send,
    {
        let attempt = self.fetch_inner(url, dest, checksum, &mut on_progress);
        let result = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                url: url.to_string(),
            }),
        };

        if let Err(e) = &result {
            warn!("Download of {} failed: {}", url, e);
            discard_partial(dest).await;
        }

        result
    }

    async fn fetch_inner<F>(
        &self,
        url: &str,
        dest: &Path,
        checksum: Option<&Checksum>,
        on_progress: &mut F,
    ) -> SyncResult<FetchReport>
    where
        F: FnMut(FetchProgress) + Send,
    {
        let mut current =
            Url::parse(url).map_err(|e| SyncError::Other(format!("Invalid URL {url}: {e}")))?;
        let mut hops = 0usize;

        let response = loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| transport_error(e, current.as_str()))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                if let Some(location) = location {
                    if hops >= self.max_redirects {
                        return Err(SyncError::TooManyRedirects {
                            url: url.to_string(),
                            limit: self.max_redirects,
                        });
                    }
                    hops += 1;
                    let next = current.join(&location).map_err(|e| {
                        SyncError::Other(format!("Invalid redirect target {location}: {e}"))
                    })?;
                    debug!("Redirecting to: {}", next);
                    current = next;
                    continue;
                }
            }

            if !status.is_success() {
                return Err(SyncError::HttpStatus {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            break response;
        };

        let total = response.content_length().filter(|t| *t > 0);
        let mut hasher = checksum.map(StreamingHasher::for_checksum);
        let mut bytes_done = 0u64;

        // Write inside a block so the handle is dropped before any cleanup.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| SyncError::io(dest, e))?;

            let mut stream = response.bytes_stream();
            let mut last_percent = None;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| transport_error(e, current.as_str()))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| SyncError::io(dest, e))?;
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&chunk);
                }
                bytes_done += chunk.len() as u64;

                if let Some(total) = total {
                    let percent = percent_of(bytes_done, total);
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        on_progress(FetchProgress {
                            percent,
                            bytes_done,
                            bytes_total: total,
                        });
                    }
                }
            }

            file.flush().await.map_err(|e| SyncError::io(dest, e))?;
        }

        if let (Some(expected), Some(hasher)) = (checksum, hasher) {
            let actual = hasher.finalize_hex();
            if !actual.eq_ignore_ascii_case(expected.expected()) {
                return Err(SyncError::ChecksumMismatch {
                    path: dest.to_path_buf(),
                    algorithm: expected.algorithm(),
                    expected: expected.expected().to_string(),
                    actual,
                });
            }
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", current, dest, bytes_done);
        Ok(FetchReport {
            bytes_written: bytes_done,
            final_url: current.to_string(),
        })
    }
}

fn percent_of(done: u64, total: u64) -> u8 {
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

async fn discard_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!("Removed partial download {:?}", dest),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial download {:?}: {}", dest, e),
    }
}

/// Join a remote-supplied file name onto the mods directory, refusing
/// anything that is not a single plain file name.
pub fn artifact_path(dir: &Path, file_name: &str) -> SyncResult<PathBuf> {
    let mut components = Path::new(file_name).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || file_name.contains(['/', '\\']) {
        return Err(SyncError::InvalidFileName(file_name.to_string()));
    }
    Ok(dir.join(file_name))
}
