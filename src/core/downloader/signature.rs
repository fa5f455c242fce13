// ─── Signature Fetcher ───
// Cheap change detection for a remote payload: ETag when the server has one,
// otherwise "<length>:<last-modified>". Never an integrity proof.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_RANGE, ETAG, LAST_MODIFIED, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

/// Anything that can produce a change signature for a URL.
///
/// `None` means "cannot determine", never an error.
#[async_trait]
pub trait SignatureSource: Send + Sync {
    async fn fetch_signature(&self, url: &str) -> Option<String>;
}

/// HEAD-first signature probe with a 0-byte range GET fallback.
#[derive(Debug, Clone)]
pub struct SignatureFetcher {
    client: Client,
    timeout: Duration,
}

impl SignatureFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn fetch(&self, url: &str) -> Option<String> {
        let response = match self.client.head(url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Signature probe for {} failed: {}", url, e);
                return None;
            }
        };

        let status = response.status();
        if status.is_success() {
            return extract_signature(response.headers());
        }

        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_FOUND {
            debug!("HEAD {} answered {}, retrying with a 0-byte range", url, status);
            return self.probe_with_range(url).await;
        }

        debug!("HEAD {} answered {}, signature unknown", url, status);
        None
    }

    async fn probe_with_range(&self, url: &str) -> Option<String> {
        let response = match self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Range probe for {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("Range probe {} answered {}", url, response.status());
            return None;
        }
        extract_signature(response.headers())
    }
}

#[async_trait]
impl SignatureSource for SignatureFetcher {
    async fn fetch_signature(&self, url: &str) -> Option<String> {
        self.fetch(url).await
    }
}

/// Derive a signature from response headers.
///
/// For a `206` the full length comes from `Content-Range`, so a range probe
/// yields the same signature a HEAD would.
pub fn extract_signature(headers: &HeaderMap) -> Option<String> {
    if let Some(etag) = header_str(headers, &ETAG) {
        return Some(etag.to_string());
    }

    let last_modified = header_str(headers, &LAST_MODIFIED);
    let length = content_range_total(headers).or_else(|| {
        header_str(headers, &CONTENT_LENGTH).and_then(|v| v.parse::<u64>().ok())
    });

    if last_modified.is_none() && length.is_none() {
        return None;
    }

    Some(format!(
        "{}:{}",
        length.map_or_else(|| "null".to_string(), |l| l.to_string()),
        last_modified.unwrap_or_default()
    ))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `bytes 0-0/12345` -> `12345`
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, &CONTENT_RANGE)?
        .rsplit('/')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{self, ServedFile};
    use reqwest::header::HeaderValue;

    fn fetcher() -> SignatureFetcher {
        SignatureFetcher::new(Client::new(), Duration::from_secs(5))
    }

    #[test]
    fn etag_wins_over_length() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"v42\""));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("10"));
        assert_eq!(extract_signature(&headers).as_deref(), Some("\"v42\""));
    }

    #[test]
    fn synthesizes_from_length_and_last_modified() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("2048"));
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(
            extract_signature(&headers).as_deref(),
            Some("2048:Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn partial_headers_still_produce_signature() {
        let mut only_length = HeaderMap::new();
        only_length.insert(CONTENT_LENGTH, HeaderValue::from_static("7"));
        assert_eq!(extract_signature(&only_length).as_deref(), Some("7:"));

        let mut only_modified = HeaderMap::new();
        only_modified.insert(LAST_MODIFIED, HeaderValue::from_static("yesterday"));
        assert_eq!(
            extract_signature(&only_modified).as_deref(),
            Some("null:yesterday")
        );
    }

    #[test]
    fn content_range_total_beats_partial_length() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1"));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("bytes 0-0/5000"));
        assert_eq!(extract_signature(&headers).as_deref(), Some("5000:"));
    }

    #[test]
    fn no_headers_means_unknown() {
        assert_eq!(extract_signature(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn head_request_reads_etag() {
        let base = test_support::serve(ServedFile::new(b"payload".to_vec()).with_etag("\"abc\"")).await;
        let signature = fetcher().fetch(&format!("{base}/file")).await;
        assert_eq!(signature.as_deref(), Some("\"abc\""));
    }

    #[tokio::test]
    async fn rejected_head_falls_back_to_range_probe() {
        let served = ServedFile::new(b"hello world".to_vec())
            .with_last_modified("Wed, 21 Oct 2015 07:28:00 GMT")
            .rejecting_head();
        let base = test_support::serve(served).await;

        let signature = fetcher().fetch(&format!("{base}/file")).await;
        assert_eq!(
            signature.as_deref(),
            Some("11:Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[tokio::test]
    async fn transport_error_is_unknown_signature() {
        let signature = fetcher().fetch("http://127.0.0.1:1/file").await;
        assert_eq!(signature, None);
    }

    #[tokio::test]
    async fn server_error_is_unknown_signature() {
        let base = test_support::serve(ServedFile::new(Vec::new()).failing_with(500)).await;
        assert_eq!(fetcher().fetch(&format!("{base}/file")).await, None);
    }
}
