pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{UpdaterError, UpdaterResult};
pub use crate::core::events::{CycleStage, EventSink, UpdateEvent};
pub use crate::core::state::AppState;
pub use crate::core::update::{UpdateMode, UpdateOrchestrator, UpdatePlan, UpdateResult};

/// Install the global subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launcher_updater=debug")),
        )
        .try_init();
}
