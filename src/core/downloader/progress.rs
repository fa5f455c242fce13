use serde::Serialize;

/// Snapshot emitted while a payload is transferring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    /// Cumulative bytes on disk, including a resumed prefix.
    pub bytes_received: u64,
    /// Unknown when the server omits `Content-Length`.
    pub total_bytes: Option<u64>,
    /// Present only when `total_bytes` is known, clamped to `0.0..=100.0`.
    pub percentage: Option<f64>,
}

impl DownloadProgress {
    pub fn new(bytes_received: u64, total_bytes: Option<u64>) -> Self {
        let percentage = total_bytes
            .filter(|total| *total > 0)
            .map(|total| (bytes_received as f64 * 100.0 / total as f64).clamp(0.0, 100.0));
        Self {
            bytes_received,
            total_bytes,
            percentage,
        }
    }
}

const SIZE_SUFFIXES: [&str; 7] = ["bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Render a byte count with 1024-based units and one decimal.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut magnitude = 0;
    while value >= 1024.0 && magnitude < SIZE_SUFFIXES.len() - 1 {
        value /= 1024.0;
        magnitude += 1;
    }
    // 1023.96 KB would print as "1024.0 KB"; bump it to the next unit.
    if (value * 10.0).round() / 10.0 >= 1000.0 && magnitude < SIZE_SUFFIXES.len() - 1 {
        value /= 1024.0;
        magnitude += 1;
    }
    format!("{:.1} {}", value, SIZE_SUFFIXES[magnitude])
}
