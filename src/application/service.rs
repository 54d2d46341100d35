use crate::domain::allocation::{apply_payment, sort_by_due_priority, total_outstanding};
use crate::domain::clock::Clock;
use crate::domain::installment::{CreditPlan, Installment};
use crate::domain::payment::{
    AuditEntry, PaymentPreview, PaymentReceipt, PaymentRecord, PaymentRequest, PreviewLine,
    allocation_entries,
};
use crate::domain::ports::{BookkeepingStoreBox, InstallmentStoreBox, PaymentStoreBox};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Records payments against a client's installments.
///
/// Owns the storage backends and a clock. At most one payment per client is in flight:
/// the load, allocation and writes for a client run under that client's lock.
pub struct PaymentService {
    installments: InstallmentStoreBox,
    payments: PaymentStoreBox,
    bookkeeping: BookkeepingStoreBox,
    clock: Arc<dyn Clock>,
    client_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PaymentService {
    /// Creates a new `PaymentService`.
    ///
    /// # Arguments
    ///
    /// * `installments` - The store for credit plans and installments.
    /// * `payments` - The store for payment records and allocation ledgers.
    /// * `bookkeeping` - The store for outstanding balances and the audit log.
    /// * `clock` - Source of "today" and of `paid_at` timestamps.
    pub fn new(
        installments: InstallmentStoreBox,
        payments: PaymentStoreBox,
        bookkeeping: BookkeepingStoreBox,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            installments,
            payments,
            bookkeeping,
            clock,
            client_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a plan and its installments.
    pub async fn load_plan(&self, plan: CreditPlan, installments: Vec<Installment>) -> Result<()> {
        self.installments.register_plan(plan).await?;
        for installment in installments {
            installment.validate()?;
            self.installments.store(installment).await?;
        }
        Ok(())
    }

    pub fn installment_store(&self) -> &InstallmentStoreBox {
        &self.installments
    }

    pub fn payment_store(&self) -> &PaymentStoreBox {
        &self.payments
    }

    pub fn bookkeeping_store(&self) -> &BookkeepingStoreBox {
        &self.bookkeeping
    }

    async fn client_lock(&self, client_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.client_locks.lock().await;
        locks
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the map entry once no other payment for the client holds or awaits it.
    async fn release_client_lock(&self, client_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.client_locks.lock().await;
        drop(lock);
        if locks
            .get(client_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(client_id);
        }
    }

    /// Applies a payment to the client's unpaid installments, oldest due first.
    ///
    /// Installment updates and the payment record (with its allocation ledger) either
    /// all persist or the operation fails. Balance recomputation and audit logging are
    /// best effort.
    #[instrument(skip(self, request), fields(client = %request.client_id))]
    pub async fn record_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt> {
        let amount = request.validate()?.value();
        let client_id = request.client_id.clone();

        let lock = self.client_lock(&client_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.record_locked(request, amount).await
        };
        self.release_client_lock(&client_id, lock).await;
        result
    }

    async fn record_locked(
        &self,
        request: PaymentRequest,
        amount: Decimal,
    ) -> Result<PaymentReceipt> {
        let unpaid = self
            .installments
            .unpaid_for_client(&request.client_id)
            .await?;
        if unpaid.is_empty() {
            return Err(PaymentError::validation(format!(
                "No unpaid installments found for client {}",
                request.client_id
            )));
        }
        for installment in &unpaid {
            installment.validate()?;
        }

        let as_of = self.clock.today();
        let result = apply_payment(amount, &unpaid, self.clock.as_ref());
        if result.updated_installments.is_empty() {
            return Err(PaymentError::validation(
                "Payment could not be applied to any installments",
            ));
        }
        let amount_applied = amount - result.remaining_amount;
        debug!(
            touched = result.updated_installments.len(),
            %amount_applied,
            remaining = %result.remaining_amount,
            "allocated payment"
        );

        let touched: Vec<Installment> = unpaid
            .iter()
            .filter(|installment| {
                result
                    .updated_installments
                    .iter()
                    .any(|update| update.id == installment.id)
            })
            .cloned()
            .collect();
        let overdue_installments = touched
            .iter()
            .filter(|installment| installment.is_overdue(as_of))
            .count();

        self.installments
            .apply_updates(&result.updated_installments)
            .await?;

        let payment_id = Uuid::new_v4().to_string();
        let first_update = &result.updated_installments[0];
        let first_plan = touched
            .iter()
            .find(|installment| installment.id == first_update.id)
            .map(|installment| installment.plan_id.clone());
        let payment_date = request.payment_date.unwrap_or_else(|| self.clock.today());
        let record = PaymentRecord {
            id: payment_id.clone(),
            client_id: request.client_id.clone(),
            amount,
            payment_date,
            notes: request.notes.clone(),
            receipt_url: request.receipt_url.clone().filter(|url| !url.is_empty()),
            plan_id: first_plan,
            installment_id: Some(first_update.id.clone()),
            recorded_at: self.clock.now(),
        };
        let allocations = allocation_entries(&payment_id, &unpaid, &result.updated_installments);

        if let Err(e) = self.payments.record(record, allocations.clone()).await {
            error!(error = %e, "payment record failed; restoring installments");
            if let Err(restore_err) = self.installments.restore(&touched).await {
                error!(error = %restore_err, "failed to restore installments");
            }
            return Err(e);
        }

        self.refresh_outstanding(&request.client_id).await;

        let audit = AuditEntry {
            entity_id: payment_id.clone(),
            client_id: request.client_id.clone(),
            amount,
            payment_date,
            applied_installments: result
                .updated_installments
                .iter()
                .map(|update| update.id.clone())
                .collect(),
            total_applied: amount_applied,
            remaining_amount: result.remaining_amount,
            recorded_at: self.clock.now(),
        };
        if let Err(e) = self.bookkeeping.append_audit(audit).await {
            warn!(error = %e, "failed to write audit entry");
        }

        info!(
            payment = %payment_id,
            %amount,
            %amount_applied,
            remaining = %result.remaining_amount,
            "payment recorded"
        );

        Ok(PaymentReceipt {
            payment_id,
            client_id: request.client_id,
            amount,
            amount_applied,
            remaining_amount: result.remaining_amount,
            installments_updated: result.updated_installments.len(),
            overdue_installments,
            as_of,
            allocations,
        })
    }

    /// Shows where a payment would go without writing anything.
    pub async fn preview_payment(&self, client_id: &str, amount: Decimal) -> Result<PaymentPreview> {
        let amount = PaymentRequest::new(client_id, amount).validate()?.value();
        let as_of = self.clock.today();
        let unpaid = self.installments.unpaid_for_client(client_id).await?;
        if unpaid.is_empty() {
            return Ok(PaymentPreview {
                client_id: client_id.to_string(),
                amount,
                as_of,
                installments: Vec::new(),
                remaining_amount: Decimal::ZERO,
            });
        }

        let result = apply_payment(amount, &unpaid, self.clock.as_ref());
        let by_id: HashMap<&str, &Installment> = unpaid
            .iter()
            .map(|installment| (installment.id.as_str(), installment))
            .collect();

        let installments = result
            .updated_installments
            .iter()
            .filter_map(|update| {
                by_id.get(update.id.as_str()).map(|installment| PreviewLine {
                    id: installment.id.clone(),
                    installment_number: installment.installment_number,
                    amount: installment.amount,
                    due_date: installment.due_date,
                    paid_amount: installment.paid_amount,
                    status: installment.status,
                    overdue: installment.is_overdue(as_of),
                    amount_to_apply: update.paid_amount - installment.paid_amount,
                })
            })
            .collect();

        Ok(PaymentPreview {
            client_id: client_id.to_string(),
            amount,
            as_of,
            installments,
            remaining_amount: result.remaining_amount,
        })
    }

    /// Sum of what the client still owes.
    pub async fn outstanding_balance(&self, client_id: &str) -> Result<Decimal> {
        let unpaid = self.installments.unpaid_for_client(client_id).await?;
        total_outstanding(&unpaid)
    }

    /// Unpaid installments already past due, oldest first.
    pub async fn overdue_installments(&self, client_id: &str) -> Result<Vec<Installment>> {
        let today = self.clock.today();
        let unpaid = self.installments.unpaid_for_client(client_id).await?;
        let overdue: Vec<Installment> = unpaid
            .into_iter()
            .filter(|installment| installment.is_overdue(today))
            .collect();
        Ok(sort_by_due_priority(&overdue, today))
    }

    async fn refresh_outstanding(&self, client_id: &str) {
        let outstanding = match self.outstanding_balance(client_id).await {
            Ok(outstanding) => outstanding,
            Err(e) => {
                warn!(error = %e, "failed to recompute outstanding balance");
                return;
            }
        };
        if let Err(e) = self.bookkeeping.set_outstanding(client_id, outstanding).await {
            warn!(error = %e, "failed to store outstanding balance");
        }
    }
}
