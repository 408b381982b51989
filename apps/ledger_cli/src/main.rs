use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, FailurePolicy, HttpTransactionService, ImportEvent, ImportFile, ImportPipeline,
    ImportPolicy, LedgerError, LedgerView, NavigationPolicy, TransactionService,
};
use shared::domain::TransactionId;
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "ledger", about = "Personal finance ledger client")]
struct Args {
    /// Base URL of the ledger service (overrides ledger.toml and env).
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Bearer token for the ledger service.
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the balance and every transaction.
    List,
    /// Delete a transaction, then show the refreshed ledger.
    Delete { id: String },
    /// Upload CSV files to the import endpoint, one at a time.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Keep going when a file is rejected instead of stopping the batch.
        #[arg(long)]
        continue_on_failure: bool,
        /// Return to the ledger once after the batch rather than after every file.
        #[arg(long)]
        navigate_after_batch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(token) = args.token {
        settings.auth_token = Some(token);
    }

    let service: Arc<dyn TransactionService> = Arc::new(HttpTransactionService::new(
        settings.session()?,
        settings.request_timeout(),
    )?);
    let mut view = LedgerView::new(service.clone());

    match args.command {
        Command::List => {
            view.load().await?;
            print!("{}", render::ledger(&view));
        }
        Command::Delete { id } => {
            let outcome = run_delete(&mut view, TransactionId::new(id)).await;
            print!("{}", render::ledger(&view));
            outcome?;
        }
        Command::Import {
            files,
            continue_on_failure,
            navigate_after_batch,
        } => {
            let mut policy = settings.import;
            if continue_on_failure {
                policy.on_failure = FailurePolicy::SkipAndContinue;
            }
            if navigate_after_batch {
                policy.navigation = NavigationPolicy::AfterBatch;
            }
            run_import(service, &mut view, policy, files).await?;
        }
    }

    Ok(())
}

/// Deletes `id`. The ledger is loaded first only to warn about unknown ids;
/// a failed check never blocks the delete.
async fn run_delete(view: &mut LedgerView, id: TransactionId) -> Result<(), LedgerError> {
    if let Err(err) = view.load().await {
        warn!(%id, "could not check the ledger before deleting: {err:#}");
    } else if !view.transactions().iter().any(|t| t.id == id) {
        warn!(%id, "transaction is not in the loaded ledger, asking the service anyway");
    }
    view.delete(&id).await
}

async fn run_import(
    service: Arc<dyn TransactionService>,
    view: &mut LedgerView,
    policy: ImportPolicy,
    paths: Vec<PathBuf>,
) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(ImportFile::from_path(path).await?);
    }

    let mut pipeline = ImportPipeline::new(service, policy);
    pipeline.stage(files);
    print!("{}", render::staged(pipeline.staged()));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping import after the current step");
            let _ = cancel_tx.send(true);
        }
    });

    let mut events = pipeline.subscribe_events();
    let presenter = async {
        loop {
            match events.recv().await {
                Ok(ImportEvent::NavigateToLedger) => {
                    // A failed reload is recorded on the view and rendered below.
                    let _ = view.load().await;
                    print!("{}", render::ledger(view));
                }
                Ok(ImportEvent::Finished(report)) => {
                    println!("{}", render::import_report(&report));
                    break;
                }
                Ok(event) => println!("{}", render::import_event(&event)),
                Err(RecvError::Lagged(missed)) => warn!(missed, "import progress events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    };

    let (outcome, ()) = tokio::join!(pipeline.submit(cancel_rx), presenter);
    outcome?;
    Ok(())
}
