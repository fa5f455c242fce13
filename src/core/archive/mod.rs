pub mod installer;

pub use installer::{
    extract_archive, mark_read_only, prune_replaced_folders, top_level_folders, ArchiveInstaller,
    ExtractSummary, ReplacePolicy,
};
