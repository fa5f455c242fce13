// In-process HTTP fixtures and archive builders shared by the unit tests.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_RANGE, ETAG, LAST_MODIFIED, RANGE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use zip::write::SimpleFileOptions;

/// A single payload served at a fixed path.
#[derive(Debug, Clone)]
pub struct ServedFile {
    body: Arc<Vec<u8>>,
    etag: Option<String>,
    last_modified: Option<String>,
    honour_ranges: bool,
    reject_head: bool,
    fail_status: Option<u16>,
    gets: Arc<Mutex<Vec<Option<String>>>>,
}

impl ServedFile {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            etag: None,
            last_modified: None,
            honour_ranges: true,
            reject_head: false,
            fail_status: None,
            gets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    pub fn with_last_modified(mut self, value: &str) -> Self {
        self.last_modified = Some(value.to_string());
        self
    }

    /// Answer every GET with the full body and `200 OK`.
    pub fn ignoring_ranges(mut self) -> Self {
        self.honour_ranges = false;
        self
    }

    pub fn rejecting_head(mut self) -> Self {
        self.reject_head = true;
        self
    }

    pub fn failing_with(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    /// `Range` header of every GET received so far.
    pub fn get_ranges(&self) -> Vec<Option<String>> {
        self.gets.lock().unwrap().clone()
    }

    fn validators(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(etag) = &self.etag {
            headers.insert(ETAG, HeaderValue::from_str(etag).unwrap());
        }
        if let Some(modified) = &self.last_modified {
            headers.insert(LAST_MODIFIED, HeaderValue::from_str(modified).unwrap());
        }
        headers
    }
}

/// Serve `file` at `/file`; returns the base URL.
pub async fn serve(file: ServedFile) -> String {
    serve_routes(vec![("/file", file)]).await
}

pub async fn serve_routes(routes: Vec<(&str, ServedFile)>) -> String {
    let mut router = Router::new();
    for (path, file) in routes {
        router = router.merge(Router::new().route(path, any(respond)).with_state(file));
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn respond(State(file): State<ServedFile>, method: Method, headers: HeaderMap) -> Response {
    if let Some(code) = file.fail_status {
        return StatusCode::from_u16(code).unwrap().into_response();
    }

    let len = file.body.len() as u64;

    if method == Method::HEAD {
        if file.reject_head {
            return StatusCode::METHOD_NOT_ALLOWED.into_response();
        }
        let mut response = (StatusCode::OK, file.validators()).into_response();
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(len));
        return response;
    }

    let range = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    file.gets.lock().unwrap().push(range.clone());

    if let (true, Some((start, end))) = (file.honour_ranges, range.as_deref().and_then(parse_range)) {
        if start >= len {
            let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            response.headers_mut().insert(
                CONTENT_RANGE,
                HeaderValue::from_str(&format!("bytes */{len}")).unwrap(),
            );
            return response;
        }
        let end = end.unwrap_or(len - 1).min(len - 1);
        let slice = file.body[start as usize..=end as usize].to_vec();
        let mut response = (StatusCode::PARTIAL_CONTENT, file.validators(), slice).into_response();
        response.headers_mut().insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {start}-{end}/{len}")).unwrap(),
        );
        return response;
    }

    (StatusCode::OK, file.validators(), file.body.to_vec()).into_response()
}

/// `bytes=N-` or `bytes=N-M`
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        e => Some(e.parse().ok()?),
    };
    Some((start, end))
}

/// Build a zip in memory. `None` content marks a directory entry.
pub fn zip_bytes(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        match content {
            Some(bytes) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(bytes).unwrap();
            }
            None => {
                writer.add_directory(*name, options).unwrap();
            }
        }
    }
    writer.finish().unwrap().into_inner()
}
