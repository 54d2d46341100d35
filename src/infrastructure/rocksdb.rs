use crate::domain::installment::{CreditPlan, Installment, UpdatedInstallment};
use crate::domain::payment::{AllocationEntry, AuditEntry, PaymentRecord};
use crate::domain::ports::{BookkeepingStore, InstallmentStore, PaymentStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for credit plans (plan id -> plan).
pub const CF_PLANS: &str = "plans";
/// Column Family for installments (installment id -> sequenced row).
pub const CF_INSTALLMENTS: &str = "installments";
/// Column Family for payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for allocation ledgers (payment id -> entries).
pub const CF_ALLOCATIONS: &str = "allocations";
/// Column Family for per-client outstanding balances.
pub const CF_OUTSTANDING: &str = "outstanding";
/// Column Family for the audit log (sequence -> entry).
pub const CF_AUDIT: &str = "audit";
/// Column Family for counters.
pub const CF_META: &str = "meta";

const INSTALLMENT_SEQ: &[u8] = b"installment_seq";
const AUDIT_SEQ: &[u8] = b"audit_seq";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_PLANS,
    CF_INSTALLMENTS,
    CF_PAYMENTS,
    CF_ALLOCATIONS,
    CF_OUTSTANDING,
    CF_AUDIT,
    CF_META,
];

/// Installment row plus its insertion sequence, which keeps listing order stable.
#[derive(Serialize, Deserialize)]
struct StoredInstallment {
    seq: u64,
    installment: Installment,
}

/// A persistent store implementation using RocksDB.
///
/// Every entity lives in its own Column Family. Multi-row writes go through a
/// `WriteBatch`, and a write mutex serializes read-modify-write sequences.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Creates any missing column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::StorageError(format!("column family {name} not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn next_seq(&self, batch: &mut WriteBatch, key: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    PaymentError::StorageError("corrupt sequence counter".to_string())
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        batch.put_cf(cf, key, next.to_be_bytes());
        Ok(next)
    }

    fn stored_installment(&self, id: &str) -> Result<Option<StoredInstallment>> {
        self.read(CF_INSTALLMENTS, id.as_bytes())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| PaymentError::InternalError(Box::new(e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| PaymentError::InternalError(Box::new(e)))
}

#[async_trait]
impl InstallmentStore for RocksDBStore {
    async fn register_plan(&self, plan: CreditPlan) -> Result<()> {
        let cf = self.cf(CF_PLANS)?;
        self.db.put_cf(cf, plan.id.as_bytes(), encode(&plan)?)?;
        Ok(())
    }

    async fn store(&self, installment: Installment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .read::<CreditPlan>(CF_PLANS, installment.plan_id.as_bytes())?
            .is_none()
        {
            return Err(PaymentError::NotFound(format!(
                "credit plan {}",
                installment.plan_id
            )));
        }

        let mut batch = WriteBatch::default();
        let seq = match self.stored_installment(&installment.id)? {
            Some(existing) => existing.seq,
            None => self.next_seq(&mut batch, INSTALLMENT_SEQ)?,
        };
        let key = installment.id.clone();
        batch.put_cf(
            self.cf(CF_INSTALLMENTS)?,
            key.as_bytes(),
            encode(&StoredInstallment { seq, installment })?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, installment_id: &str) -> Result<Option<Installment>> {
        Ok(self
            .stored_installment(installment_id)?
            .map(|stored| stored.installment))
    }

    async fn unpaid_for_client(&self, client_id: &str) -> Result<Vec<Installment>> {
        let plan_ids: Vec<String> = self
            .scan::<CreditPlan>(CF_PLANS)?
            .into_iter()
            .filter(|plan| plan.client_id == client_id)
            .map(|plan| plan.id)
            .collect();

        let mut rows: Vec<StoredInstallment> = self
            .scan::<StoredInstallment>(CF_INSTALLMENTS)?
            .into_iter()
            .filter(|stored| {
                stored.installment.status.is_unpaid()
                    && plan_ids.contains(&stored.installment.plan_id)
            })
            .collect();
        rows.sort_by_key(|stored| stored.seq);

        Ok(rows.into_iter().map(|stored| stored.installment).collect())
    }

    async fn apply_updates(&self, updates: &[UpdatedInstallment]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_INSTALLMENTS)?;
        let mut batch = WriteBatch::default();

        for update in updates {
            let mut stored = self
                .stored_installment(&update.id)?
                .ok_or_else(|| PaymentError::NotFound(format!("installment {}", update.id)))?;
            stored.installment.apply(update);
            batch.put_cf(cf, update.id.as_bytes(), encode(&stored)?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    async fn restore(&self, snapshot: &[Installment]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_INSTALLMENTS)?;
        let mut batch = WriteBatch::default();

        for installment in snapshot {
            let existing = self.stored_installment(&installment.id)?.ok_or_else(|| {
                PaymentError::NotFound(format!("installment {}", installment.id))
            })?;
            let stored = StoredInstallment {
                seq: existing.seq,
                installment: installment.clone(),
            };
            batch.put_cf(cf, installment.id.as_bytes(), encode(&stored)?);
        }

        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn record(&self, payment: PaymentRecord, allocations: Vec<AllocationEntry>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .read::<PaymentRecord>(CF_PAYMENTS, payment.id.as_bytes())?
            .is_some()
        {
            return Err(PaymentError::StorageError(format!(
                "payment {} already recorded",
                payment.id
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_PAYMENTS)?,
            payment.id.as_bytes(),
            encode(&payment)?,
        );
        batch.put_cf(
            self.cf(CF_ALLOCATIONS)?,
            payment.id.as_bytes(),
            encode(&allocations)?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>> {
        self.read(CF_PAYMENTS, payment_id.as_bytes())
    }

    async fn allocations_for(&self, payment_id: &str) -> Result<Vec<AllocationEntry>> {
        Ok(self
            .read(CF_ALLOCATIONS, payment_id.as_bytes())?
            .unwrap_or_default())
    }

    async fn payments_for_client(&self, client_id: &str) -> Result<Vec<PaymentRecord>> {
        let mut payments: Vec<PaymentRecord> = self
            .scan::<PaymentRecord>(CF_PAYMENTS)?
            .into_iter()
            .filter(|payment| payment.client_id == client_id)
            .collect();
        payments.sort_by_key(|payment| payment.recorded_at);
        Ok(payments)
    }
}

#[async_trait]
impl BookkeepingStore for RocksDBStore {
    async fn set_outstanding(&self, client_id: &str, amount: Decimal) -> Result<()> {
        let cf = self.cf(CF_OUTSTANDING)?;
        self.db.put_cf(cf, client_id.as_bytes(), encode(&amount)?)?;
        Ok(())
    }

    async fn outstanding(&self, client_id: &str) -> Result<Option<Decimal>> {
        self.read(CF_OUTSTANDING, client_id.as_bytes())
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let seq = self.next_seq(&mut batch, AUDIT_SEQ)?;
        batch.put_cf(self.cf(CF_AUDIT)?, seq.to_be_bytes(), encode(&entry)?);
        self.db.write(batch)?;
        Ok(())
    }

    async fn audit_entries(&self) -> Result<Vec<AuditEntry>> {
        // Big-endian keys iterate in append order.
        self.scan(CF_AUDIT)
    }
}
