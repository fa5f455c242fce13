use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::progress::DownloadProgress;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::events::EventSink;

/// Resumable single-file downloader.
///
/// Bytes land in `<dest>.part` and are renamed onto `dest` only once the
/// transfer completes. A leftover `.part` is resumed with a byte range.
/// No retries: a failed transfer is reported and the caller decides.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    // ── Payload download ────────────────────────────────

    /// Download `url` to `dest`, resuming a previous partial transfer.
    ///
    /// Returns the final size in bytes. On cancellation the `.part` file is
    /// left in place for the next attempt.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> UpdaterResult<u64> {
        if cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdaterError::io(parent, e))?;
        }

        let part = part_path(dest);
        let mut existing = match tokio::fs::metadata(&part).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };

        let mut response = self.send_ranged(url, existing, cancel).await?;

        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            info!(
                "Server cannot resume {} at byte {}, restarting from zero",
                url, existing
            );
            drop(response);
            remove_if_exists(&part).await?;
            existing = 0;
            response = self.send_ranged(url, 0, cancel).await?;
        } else if existing > 0 && response.status() == StatusCode::OK {
            // The server ignored the range: this body is the whole resource.
            info!("Server ignored resume range for {}, restarting from zero", url);
            existing = 0;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length().map(|len| len + existing);
        debug!(
            "Downloading {} -> {:?} (resume at {}, total {:?})",
            url, part, existing, total
        );

        let mut file = if existing > 0 {
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(&part)
                .await
        } else {
            tokio::fs::File::create(&part).await
        }
        .map_err(|e| UpdaterError::io(&part, e))?;

        let mut received = existing;
        events.download(DownloadProgress::new(received, total));

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    file.flush().await.map_err(|e| UpdaterError::io(&part, e))?;
                    info!("Download of {} paused at {} bytes", url, received);
                    return Err(UpdaterError::Cancelled);
                }
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            file.write_all(&chunk)
                .await
                .map_err(|e| UpdaterError::io(&part, e))?;
            received = received.saturating_add(chunk.len() as u64);
            events.download(DownloadProgress::new(received, total));
        }

        file.flush().await.map_err(|e| UpdaterError::io(&part, e))?;
        file.sync_all().await.map_err(|e| UpdaterError::io(&part, e))?;
        // Release the handle before the rename, Windows refuses otherwise.
        drop(file);

        remove_if_exists(dest).await?;
        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| UpdaterError::io(dest, e))?;

        info!("Downloaded {} ({} bytes)", url, received);
        Ok(received)
    }

    // ── Small documents ─────────────────────────────────

    /// GET a text document in one piece.
    pub async fn fetch_text(&self, url: &str, cancel: &CancellationToken) -> UpdaterResult<String> {
        let response = self.send_ranged(url, 0, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn send_ranged(
        &self,
        url: &str,
        start: u64,
        cancel: &CancellationToken,
    ) -> UpdaterResult<Response> {
        let mut request = self.client.get(url);
        if start > 0 {
            request = request.header(RANGE, format!("bytes={start}-"));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UpdaterError::Cancelled),
            result = request.send() => Ok(result?),
        }
    }
}

/// `client_package.zip` -> `client_package.zip.part`
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> UpdaterResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UpdaterError::io(path, e)),
    }
}
