//! Sequential multi-file import pipeline.

use std::{path::Path, sync::Arc};

use anyhow::{anyhow, Context};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::{error::LedgerError, service::TransactionService};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Raw payload of a user-selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("'{}' does not name a file", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read import file '{}'", path.display()))?;
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file staged for upload.
#[derive(Debug, Clone)]
pub struct ImportCandidate {
    file: ImportFile,
    name: String,
    readable_size: String,
}

impl ImportCandidate {
    fn stage(file: ImportFile) -> Self {
        Self {
            name: file.name.clone(),
            readable_size: readable_size(file.size()),
            file,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn readable_size(&self) -> &str {
        &self.readable_size
    }

    fn into_upload(self) -> (String, ImportFile) {
        (self.name, self.file)
    }
}

/// Human readable size in base-1024 units, at most two decimals.
pub fn readable_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed file; later files are not attempted.
    #[default]
    AbortBatch,
    /// Record the failure and move on to the next file.
    SkipAndContinue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigationPolicy {
    /// Signal navigation to the ledger after every successful file.
    #[default]
    AfterEachFile,
    /// Signal navigation once, after the batch, if anything succeeded.
    AfterBatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportPolicy {
    pub on_failure: FailurePolicy,
    pub navigation: NavigationPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Idle,
    Uploading {
        index: usize,
    },
    Done,
    Failed {
        index: usize,
    },
    Cancelled {
        index: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
    /// Files never attempted because the batch stopped early.
    pub skipped: Vec<String>,
    /// File whose upload was in flight when the batch was cancelled. The
    /// service may or may not have applied it.
    pub interrupted: Option<String>,
    pub imported_transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    UploadStarted {
        index: usize,
        name: String,
    },
    Uploaded {
        index: usize,
        name: String,
        imported: usize,
    },
    UploadFailed {
        index: usize,
        name: String,
        reason: String,
    },
    NavigateToLedger,
    Finished(ImportReport),
}

enum Step {
    Uploaded(usize),
    Failed(anyhow::Error),
    Cancelled,
}

pub struct ImportPipeline {
    service: Arc<dyn TransactionService>,
    policy: ImportPolicy,
    staged: Vec<ImportCandidate>,
    state: PipelineState,
    events: broadcast::Sender<ImportEvent>,
}

impl ImportPipeline {
    pub fn new(service: Arc<dyn TransactionService>, policy: ImportPolicy) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            service,
            policy,
            staged: Vec::new(),
            state: PipelineState::Idle,
            events,
        }
    }

    pub fn policy(&self) -> ImportPolicy {
        self.policy
    }

    pub fn staged(&self) -> &[ImportCandidate] {
        &self.staged
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ImportEvent> {
        self.events.subscribe()
    }

    /// Replaces the staged selection. Previously staged files are discarded.
    pub fn stage(&mut self, files: Vec<ImportFile>) {
        self.staged = files.into_iter().map(ImportCandidate::stage).collect();
        self.state = PipelineState::Idle;
        info!(files = self.staged.len(), "staged import files");
    }

    /// Uploads the staged files one at a time, in staging order.
    ///
    /// The staged queue is consumed whatever the outcome. Setting `cancel`
    /// to `true` stops the batch at the next suspension point; an upload in
    /// flight at that moment is dropped.
    pub async fn submit(
        &mut self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<ImportReport, LedgerError> {
        let mut queue = std::mem::take(&mut self.staged).into_iter().enumerate();
        let mut report = ImportReport::default();

        while let Some((index, candidate)) = queue.next() {
            let (name, upload) = candidate.into_upload();
            if *cancel.borrow() {
                report.skipped.push(name.clone());
                return Err(self.cancel_batch(index, name, queue, report));
            }

            self.state = PipelineState::Uploading { index };
            let _ = self.events.send(ImportEvent::UploadStarted {
                index,
                name: name.clone(),
            });

            // A finished upload wins over a cancel observed in the same poll.
            let step = tokio::select! {
                biased;
                result = self.service.import_file(upload) => match result {
                    Ok(imported) => Step::Uploaded(imported),
                    Err(err) => Step::Failed(err),
                },
                _ = cancelled(&mut cancel) => Step::Cancelled,
            };

            match step {
                Step::Uploaded(imported) => {
                    info!(index, file = %name, imported, "import file uploaded");
                    report.imported_transactions += imported;
                    let _ = self.events.send(ImportEvent::Uploaded {
                        index,
                        name: name.clone(),
                        imported,
                    });
                    report.uploaded.push(name);
                    if self.policy.navigation == NavigationPolicy::AfterEachFile {
                        let _ = self.events.send(ImportEvent::NavigateToLedger);
                    }
                }
                Step::Failed(source) => {
                    warn!(index, file = %name, "import file rejected: {source:#}");
                    let _ = self.events.send(ImportEvent::UploadFailed {
                        index,
                        name: name.clone(),
                        reason: format!("{source:#}"),
                    });
                    match self.policy.on_failure {
                        FailurePolicy::AbortBatch => {
                            self.state = PipelineState::Failed { index };
                            report.failed.push(name.clone());
                            report.skipped = queue.map(|(_, rest)| rest.name).collect();
                            self.finish(report);
                            return Err(LedgerError::ImportFailure { file: name, source });
                        }
                        FailurePolicy::SkipAndContinue => report.failed.push(name),
                    }
                }
                Step::Cancelled => {
                    report.interrupted = Some(name.clone());
                    return Err(self.cancel_batch(index, name, queue, report));
                }
            }
        }

        if self.policy.navigation == NavigationPolicy::AfterBatch && !report.uploaded.is_empty()
        {
            let _ = self.events.send(ImportEvent::NavigateToLedger);
        }
        self.state = PipelineState::Done;
        self.finish(report.clone());
        Ok(report)
    }

    fn cancel_batch(
        &mut self,
        index: usize,
        name: String,
        rest: impl Iterator<Item = (usize, ImportCandidate)>,
        mut report: ImportReport,
    ) -> LedgerError {
        warn!(index, file = %name, "import batch cancelled");
        self.state = PipelineState::Cancelled { index };
        report
            .skipped
            .extend(rest.map(|(_, candidate)| candidate.name));
        self.finish(report);
        LedgerError::ImportCancelled { file: name }
    }

    fn finish(&self, report: ImportReport) {
        info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            interrupted = report.interrupted.is_some(),
            "import batch finished"
        );
        let _ = self.events.send(ImportEvent::Finished(report));
    }
}

/// Resolves once cancellation is requested. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
#[path = "tests/import_tests.rs"]
mod tests;
