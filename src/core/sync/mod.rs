pub mod config_sync;

pub use config_sync::{ConfigSynchronizer, SyncOutcome};
