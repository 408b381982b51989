//! In-memory `TransactionService` that records every call.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    domain::{Category, TransactionId, TransactionType},
    protocol::{Balance, LedgerResponse, Transaction},
};
use tokio::sync::{Mutex, Notify};

use crate::{import::ImportFile, service::TransactionService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    FetchLedger,
    Delete(String),
    ImportStarted(String),
    ImportFinished(String),
}

#[derive(Default)]
pub(crate) struct FakeTransactionService {
    ledgers: Mutex<VecDeque<Result<LedgerResponse, String>>>,
    failing_deletes: HashSet<String>,
    failing_imports: HashSet<String>,
    hanging_imports: HashSet<String>,
    gated_imports: HashMap<String, Arc<Notify>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransactionService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues a ledger response. The last queued response is repeated.
    pub(crate) fn with_ledger(mut self, ledger: LedgerResponse) -> Self {
        self.ledgers.get_mut().push_back(Ok(ledger));
        self
    }

    pub(crate) fn with_ledger_error(mut self, message: &str) -> Self {
        self.ledgers.get_mut().push_back(Err(message.to_string()));
        self
    }

    pub(crate) fn failing_delete(mut self, id: &str) -> Self {
        self.failing_deletes.insert(id.to_string());
        self
    }

    pub(crate) fn failing_import(mut self, name: &str) -> Self {
        self.failing_imports.insert(name.to_string());
        self
    }

    pub(crate) fn hanging_import(mut self, name: &str) -> Self {
        self.hanging_imports.insert(name.to_string());
        self
    }

    /// The upload of `name` completes as soon as `gate` is notified.
    pub(crate) fn gated_import(mut self, name: &str, gate: Arc<Notify>) -> Self {
        self.gated_imports.insert(name.to_string(), gate);
        self
    }

    pub(crate) async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn count(&self, call: &Call) -> usize {
        self.calls.lock().await.iter().filter(|c| *c == call).count()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn record(&self, call: Call) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl TransactionService for FakeTransactionService {
    async fn fetch_ledger(&self) -> Result<LedgerResponse> {
        self.record(Call::FetchLedger).await;
        let next = {
            let mut ledgers = self.ledgers.lock().await;
            if ledgers.len() > 1 {
                ledgers.pop_front()
            } else {
                ledgers.front().cloned()
            }
        };
        match next {
            Some(Ok(ledger)) => Ok(ledger),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no ledger scripted")),
        }
    }

    async fn delete_transaction(&self, id: &TransactionId) -> Result<()> {
        self.record(Call::Delete(id.to_string())).await;
        if self.failing_deletes.contains(id.as_str()) {
            return Err(anyhow!("service responded with status 400: cannot delete"));
        }
        Ok(())
    }

    async fn import_file(&self, file: ImportFile) -> Result<usize> {
        self.record(Call::ImportStarted(file.name.clone())).await;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hanging_imports.contains(&file.name) {
            std::future::pending::<()>().await;
        }
        match self.gated_imports.get(&file.name) {
            Some(gate) => gate.notified().await,
            None => tokio::time::sleep(Duration::from_millis(10)).await,
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.record(Call::ImportFinished(file.name.clone())).await;

        if self.failing_imports.contains(&file.name) {
            return Err(anyhow!("service rejected {}", file.name));
        }
        let rows = String::from_utf8_lossy(&file.bytes).lines().count();
        Ok(rows.saturating_sub(1))
    }
}

pub(crate) fn at(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("timestamp")
}

pub(crate) fn transaction(
    id: &str,
    title: &str,
    value: i64,
    kind: TransactionType,
    category: &str,
) -> Transaction {
    Transaction {
        id: TransactionId::new(id),
        title: title.to_string(),
        value: Decimal::from(value),
        kind,
        category: Category {
            title: category.to_string(),
        },
        created_at: at("2020-04-02T12:00:00Z"),
        updated_at: at("2020-04-02T12:00:00Z"),
    }
}

pub(crate) fn ledger(transactions: Vec<Transaction>, income: i64, outcome: i64) -> LedgerResponse {
    LedgerResponse {
        transactions,
        balance: Balance {
            income: Decimal::from(income),
            outcome: Decimal::from(outcome),
            total: Decimal::from(income - outcome),
        },
    }
}

pub(crate) fn csv_file(name: &str, rows: usize) -> ImportFile {
    let mut body = String::from("title,type,value,category\n");
    for row in 0..rows {
        body.push_str(&format!("Item {row},outcome,10,Misc\n"));
    }
    ImportFile::new(name, body)
}
