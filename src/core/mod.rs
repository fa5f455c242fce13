// ─── Launcher Updater Core ───
// Decides whether a game client install is current, fetches what is missing
// and records what ended up on disk.
//
// Architecture:
//   core/
//     config/     — Remote document, local settings, on-disk layout
//     version/    — Version codec + persisted version record
//     downloader/ — Resumable downloads + change signatures
//     archive/    — Zip extraction with protected folders
//     sync/       — Transactional launcher config refresh
//     update/     — Planner + cycle orchestrator
//     state/      — Composition root for shells

pub mod archive;
pub mod config;
pub mod downloader;
pub mod error;
pub mod events;
pub mod http;
pub mod state;
pub mod sync;
pub mod update;
pub mod version;

#[cfg(test)]
mod test_support;
