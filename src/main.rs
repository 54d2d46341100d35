use chrono::NaiveDate;
use clap::Parser;
use duefirst::application::service::PaymentService;
use duefirst::domain::clock::{Clock, FixedClock, SystemClock};
use duefirst::domain::ports::{BookkeepingStoreBox, InstallmentStoreBox, PaymentStoreBox};
use duefirst::infrastructure::in_memory::{
    InMemoryBookkeepingStore, InMemoryInstallmentStore, InMemoryPaymentStore,
};
use duefirst::interfaces::csv::installment_reader::InstallmentReader;
use duefirst::interfaces::csv::payment_reader::PaymentReader;
use duefirst::interfaces::csv::receipt_writer::{ReceiptRow, ReceiptWriter};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Installments CSV file (client, plan, id, number, amount, due_date, paid_amount, status)
    installments: PathBuf,

    /// Payments CSV file (client, amount, payment_date, notes, receipt_url)
    payments: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "DUEFIRST_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Allocate as of this date (YYYY-MM-DD) instead of the system date.
    #[arg(long, env = "DUEFIRST_TODAY")]
    today: Option<NaiveDate>,

    /// Show where each payment would go without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Log filter, e.g. `info` or `duefirst=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,
}

type Stores = (InstallmentStoreBox, PaymentStoreBox, BookkeepingStoreBox);

fn in_memory_stores() -> Stores {
    (
        Box::new(InMemoryInstallmentStore::new()),
        Box::new(InMemoryPaymentStore::new()),
        Box::new(InMemoryBookkeepingStore::new()),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use duefirst::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(db_path) => {
            let store = RocksDBStore::open(&db_path).into_diagnostic()?;
            info!(path = %db_path.display(), "using RocksDB storage");
            let stores: Stores = (
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
            );
            Ok(stores)
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        tracing::warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let clock: Arc<dyn Clock> = match cli.today {
        Some(today) => Arc::new(FixedClock::on(today)),
        None => Arc::new(SystemClock),
    };
    let (installments, payments, bookkeeping) = open_stores(cli.db_path)?;
    let service = PaymentService::new(installments, payments, bookkeeping, clock);

    // Load installments; rows replace stored ones with the same id.
    let file = File::open(&cli.installments).into_diagnostic()?;
    let mut loaded = 0usize;
    for record in InstallmentReader::new(file).records() {
        match record {
            Ok(record) => {
                let (plan, installment) = record.into_parts();
                match service.load_plan(plan, vec![installment]).await {
                    Ok(()) => loaded += 1,
                    Err(e) => error!("Error loading installment: {}", e),
                }
            }
            Err(e) => error!("Error reading installment: {}", e),
        }
    }
    info!(loaded, "installments loaded");

    // Apply payments in file order.
    let stdout = io::stdout();
    let mut writer = ReceiptWriter::new(stdout.lock());
    let file = File::open(&cli.payments).into_diagnostic()?;
    for request in PaymentReader::new(file).payments() {
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                error!("Error reading payment: {}", e);
                continue;
            }
        };

        let row = if cli.dry_run {
            service
                .preview_payment(&request.client_id, request.amount)
                .await
                .map(|preview| ReceiptRow::from(&preview))
        } else {
            service
                .record_payment(request)
                .await
                .map(|receipt| ReceiptRow::from(&receipt))
        };

        match row {
            Ok(row) => writer.write(&row).into_diagnostic()?,
            Err(e) => error!("Error processing payment: {}", e),
        }
    }
    writer.flush().into_diagnostic()?;

    Ok(())
}
