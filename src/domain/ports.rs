use super::installment::{CreditPlan, Installment, UpdatedInstallment};
use super::payment::{AllocationEntry, AuditEntry, PaymentRecord};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait InstallmentStore: Send + Sync {
    async fn register_plan(&self, plan: CreditPlan) -> Result<()>;
    /// Inserts or replaces an installment; its plan must be registered.
    async fn store(&self, installment: Installment) -> Result<()>;
    async fn get(&self, installment_id: &str) -> Result<Option<Installment>>;
    /// Installments of the client's plans whose status is PENDING, PARTIAL or OVERDUE.
    async fn unpaid_for_client(&self, client_id: &str) -> Result<Vec<Installment>>;
    /// Applies every update or none. An unknown id fails the whole batch.
    async fn apply_updates(&self, updates: &[UpdatedInstallment]) -> Result<()>;
    /// Puts previously loaded rows back as they were.
    async fn restore(&self, snapshot: &[Installment]) -> Result<()>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists the payment and its allocation ledger together.
    async fn record(&self, payment: PaymentRecord, allocations: Vec<AllocationEntry>) -> Result<()>;
    async fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>>;
    async fn allocations_for(&self, payment_id: &str) -> Result<Vec<AllocationEntry>>;
    async fn payments_for_client(&self, client_id: &str) -> Result<Vec<PaymentRecord>>;
}

/// Derived figures and audit trail; failures here never undo a payment.
#[async_trait]
pub trait BookkeepingStore: Send + Sync {
    async fn set_outstanding(&self, client_id: &str, amount: Decimal) -> Result<()>;
    async fn outstanding(&self, client_id: &str) -> Result<Option<Decimal>>;
    async fn append_audit(&self, entry: AuditEntry) -> Result<()>;
    async fn audit_entries(&self) -> Result<Vec<AuditEntry>>;
}

pub type InstallmentStoreBox = Box<dyn InstallmentStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type BookkeepingStoreBox = Box<dyn BookkeepingStore>;
