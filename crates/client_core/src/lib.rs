pub mod config;
pub mod error;
pub mod import;
pub mod ledger_view;
pub mod service;

pub use config::{load_settings, Session, Settings};
pub use error::LedgerError;
pub use import::{
    readable_size, FailurePolicy, ImportCandidate, ImportEvent, ImportFile, ImportPipeline,
    ImportPolicy, ImportReport, NavigationPolicy, PipelineState,
};
pub use ledger_view::{LedgerSnapshot, LedgerView};
pub use service::{HttpTransactionService, TransactionService};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
