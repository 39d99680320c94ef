// Resolution and the per-identifier processing loop

pub mod aggregator;
pub mod orchestrator;

pub use aggregator::{Aggregator, FieldPriorityTable, SourceResults};
pub use orchestrator::{Orchestrator, RunOptions, RunSummary};
