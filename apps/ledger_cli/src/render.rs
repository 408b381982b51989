//! Terminal rendering of ledger and import state.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use client_core::{ImportCandidate, ImportEvent, ImportReport, LedgerView};
use rust_decimal::Decimal;
use shared::{domain::TransactionType, protocol::Transaction};

/// Formats a monetary value as Brazilian real, e.g. `R$ 1.234,56`.
pub fn format_value(value: Decimal) -> String {
    let fixed = format!("{:.2}", value.round_dp(2).abs());
    let (units, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}R$ {grouped},{cents}")
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y").to_string()
}

fn transaction_row(transaction: &Transaction) -> String {
    let prefix = match transaction.kind {
        TransactionType::Outcome => " - ",
        TransactionType::Income => "",
    };
    format!(
        "{:<28} {:>16} {:<16} {}",
        transaction.title,
        format!("{prefix}{}", format_value(transaction.value)),
        transaction.category.title,
        format_date(transaction.created_at),
    )
}

pub fn ledger(view: &LedgerView) -> String {
    let mut out = String::new();
    match view.balance() {
        Some(balance) => {
            let _ = writeln!(out, "Entradas  {}", format_value(balance.income));
            let _ = writeln!(out, "Saídas    {}", format_value(balance.outcome));
            let _ = writeln!(out, "Total     {}", format_value(balance.total));
        }
        None => {
            let _ = writeln!(out, "Carregando...");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<28} {:>16} {:<16} {}",
        "Título", "Preço", "Categoria", "Data"
    );

    if view.transactions().is_empty() {
        let _ = writeln!(out, "Nenhuma transação cadastrada");
    }
    for transaction in view.transactions() {
        let _ = writeln!(out, "{}  [{}]", transaction_row(transaction), transaction.id);
    }
    if let Some(err) = view.last_error() {
        let _ = writeln!(out, "\n! {err}");
    }
    out
}

pub fn staged(candidates: &[ImportCandidate]) -> String {
    let mut out = String::new();
    for candidate in candidates {
        let _ = writeln!(out, "  {} ({})", candidate.name(), candidate.readable_size());
    }
    out
}

pub fn import_event(event: &ImportEvent) -> String {
    match event {
        ImportEvent::UploadStarted { index, name } => format!("[{}] enviando {name}...", index + 1),
        ImportEvent::Uploaded {
            index,
            name,
            imported,
        } => format!("[{}] {name}: {imported} transações importadas", index + 1),
        ImportEvent::UploadFailed {
            index,
            name,
            reason,
        } => format!("[{}] {name}: falhou ({reason})", index + 1),
        ImportEvent::NavigateToLedger => "-> dashboard".to_string(),
        ImportEvent::Finished(report) => import_report(report),
    }
}

pub fn import_report(report: &ImportReport) -> String {
    let mut out = format!(
        "importação: {} enviados, {} com falha, {} ignorados",
        report.uploaded.len(),
        report.failed.len(),
        report.skipped.len()
    );
    if !report.skipped.is_empty() {
        let _ = write!(out, " ({})", report.skipped.join(", "));
    }
    if let Some(name) = &report.interrupted {
        let _ = write!(out, "; {name} interrompido, confira o dashboard");
    }
    out
}
