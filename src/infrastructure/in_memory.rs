use crate::domain::installment::{CreditPlan, Installment, UpdatedInstallment};
use crate::domain::payment::{AllocationEntry, AuditEntry, PaymentRecord};
use crate::domain::ports::{BookkeepingStore, InstallmentStore, PaymentStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct InstallmentTable {
    /// plan id -> client id
    plans: HashMap<String, String>,
    /// Rows in insertion order, so equal due dates keep a stable order.
    rows: Vec<Installment>,
    index: HashMap<String, usize>,
}

impl InstallmentTable {
    fn upsert(&mut self, installment: Installment) {
        match self.index.get(&installment.id) {
            Some(&pos) => self.rows[pos] = installment,
            None => {
                self.index.insert(installment.id.clone(), self.rows.len());
                self.rows.push(installment);
            }
        }
    }
}

/// A thread-safe in-memory store for credit plans and installments.
///
/// Uses `Arc<RwLock<..>>` to allow shared concurrent access. Batches are applied under a
/// single write lock, which makes them atomic.
#[derive(Default, Clone)]
pub struct InMemoryInstallmentStore {
    table: Arc<RwLock<InstallmentTable>>,
}

impl InMemoryInstallmentStore {
    /// Creates a new, empty in-memory installment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstallmentStore for InMemoryInstallmentStore {
    async fn register_plan(&self, plan: CreditPlan) -> Result<()> {
        let mut table = self.table.write().await;
        table.plans.insert(plan.id, plan.client_id);
        Ok(())
    }

    async fn store(&self, installment: Installment) -> Result<()> {
        let mut table = self.table.write().await;
        if !table.plans.contains_key(&installment.plan_id) {
            return Err(PaymentError::NotFound(format!(
                "credit plan {}",
                installment.plan_id
            )));
        }
        table.upsert(installment);
        Ok(())
    }

    async fn get(&self, installment_id: &str) -> Result<Option<Installment>> {
        let table = self.table.read().await;
        Ok(table
            .index
            .get(installment_id)
            .map(|&pos| table.rows[pos].clone()))
    }

    async fn unpaid_for_client(&self, client_id: &str) -> Result<Vec<Installment>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .iter()
            .filter(|installment| {
                installment.status.is_unpaid()
                    && table.plans.get(&installment.plan_id).map(String::as_str) == Some(client_id)
            })
            .cloned()
            .collect())
    }

    async fn apply_updates(&self, updates: &[UpdatedInstallment]) -> Result<()> {
        let mut table = self.table.write().await;
        // Resolve every id before touching anything.
        let positions = updates
            .iter()
            .map(|update| {
                table
                    .index
                    .get(&update.id)
                    .copied()
                    .ok_or_else(|| PaymentError::NotFound(format!("installment {}", update.id)))
            })
            .collect::<Result<Vec<usize>>>()?;

        for (pos, update) in positions.into_iter().zip(updates) {
            table.rows[pos].apply(update);
        }
        Ok(())
    }

    async fn restore(&self, snapshot: &[Installment]) -> Result<()> {
        let mut table = self.table.write().await;
        for installment in snapshot {
            table.upsert(installment.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
struct PaymentTable {
    payments: Vec<PaymentRecord>,
    allocations: HashMap<String, Vec<AllocationEntry>>,
}

/// A thread-safe in-memory store for payments and their allocation ledger.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    table: Arc<RwLock<PaymentTable>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn record(&self, payment: PaymentRecord, allocations: Vec<AllocationEntry>) -> Result<()> {
        let mut table = self.table.write().await;
        if table.payments.iter().any(|p| p.id == payment.id) {
            return Err(PaymentError::StorageError(format!(
                "payment {} already recorded",
                payment.id
            )));
        }
        table.allocations.insert(payment.id.clone(), allocations);
        table.payments.push(payment);
        Ok(())
    }

    async fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>> {
        let table = self.table.read().await;
        Ok(table.payments.iter().find(|p| p.id == payment_id).cloned())
    }

    async fn allocations_for(&self, payment_id: &str) -> Result<Vec<AllocationEntry>> {
        let table = self.table.read().await;
        Ok(table
            .allocations
            .get(payment_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn payments_for_client(&self, client_id: &str) -> Result<Vec<PaymentRecord>> {
        let table = self.table.read().await;
        Ok(table
            .payments
            .iter()
            .filter(|p| p.client_id == client_id)
            .cloned()
            .collect())
    }
}

/// In-memory outstanding balances and audit log.
#[derive(Default, Clone)]
pub struct InMemoryBookkeepingStore {
    outstanding: Arc<RwLock<HashMap<String, Decimal>>>,
    audit: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryBookkeepingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookkeepingStore for InMemoryBookkeepingStore {
    async fn set_outstanding(&self, client_id: &str, amount: Decimal) -> Result<()> {
        self.outstanding
            .write()
            .await
            .insert(client_id.to_string(), amount);
        Ok(())
    }

    async fn outstanding(&self, client_id: &str) -> Result<Option<Decimal>> {
        Ok(self.outstanding.read().await.get(client_id).copied())
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        self.audit.write().await.push(entry);
        Ok(())
    }

    async fn audit_entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.audit.read().await.clone())
    }
}
