use shared::domain::TransactionId;
use thiserror::Error;

/// Failures surfaced by the ledger and import controllers.
///
/// None of these are fatal: controllers return them to the presentation
/// layer and keep their own state consistent.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to load ledger: {source}")]
    LoadFailure { source: anyhow::Error },
    #[error("failed to delete transaction {id}: {source}")]
    DeleteFailure {
        id: TransactionId,
        source: anyhow::Error,
    },
    #[error("failed to import file {file}: {source}")]
    ImportFailure { file: String, source: anyhow::Error },
    #[error("import cancelled before {file} completed")]
    ImportCancelled { file: String },
}

impl LedgerError {
    /// Name of the file this failure is attributed to, for import failures.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::ImportFailure { file, .. } | Self::ImportCancelled { file } => Some(file),
            Self::LoadFailure { .. } | Self::DeleteFailure { .. } => None,
        }
    }
}
