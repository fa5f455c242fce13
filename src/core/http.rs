use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::config::HttpSettings;

/// Build the transport shared by the downloader and the signature probe.
///
/// Compression is disabled so byte ranges and `Content-Length` address the
/// payload exactly as stored on the server.
pub fn build_http_client(settings: &HttpSettings) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(default_headers)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .read_timeout(Duration::from_secs(settings.read_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(settings.pool_idle_timeout_secs))
        .pool_max_idle_per_host(settings.pool_max_idle_per_host)
        .build()
}
