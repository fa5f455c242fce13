pub mod orchestrator;
pub mod plan;

pub use orchestrator::{UpdateOrchestrator, UpdateResult};
pub use plan::{decide, LocalInstall, UpdateMode, UpdatePlan, UpdatePlanner};
