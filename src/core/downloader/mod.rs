// ─── Downloader ───
//   client    — resumable payload download + small text documents
//   signature — HEAD / range-probe change signatures
//   progress  — progress snapshots and byte formatting

pub mod client;
pub mod progress;
pub mod signature;

pub use client::{part_path, Downloader};
pub use progress::{format_size, DownloadProgress};
pub use signature::{extract_signature, SignatureFetcher, SignatureSource};
