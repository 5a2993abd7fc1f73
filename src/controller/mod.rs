pub mod affordance;
pub mod chain;
pub mod run_context;
pub mod session;

pub use affordance::Affordance;
pub use chain::{ChainedTaskController, TaskOutcome};
pub use run_context::RunContext;
pub use session::{ChainSession, PendingCacheWrite};
