pub mod executor;
pub mod ledger;
pub mod orchestrator;
pub mod reporter;
pub mod splitter;
pub mod store;

pub use executor::Executor;
pub use ledger::{Ledger, LedgerEntry, LedgerStatus};
pub use orchestrator::{Orchestrator, Phase, RunReport, StatusReport};
pub use reporter::{RecordingReporter, Report, Reporter, Severity, TracingReporter};
pub use splitter::split_statements;
pub use store::{MigrationFile, list_pending};
