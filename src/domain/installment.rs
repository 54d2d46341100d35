use crate::error::{PaymentError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stored status of an installment.
///
/// `Overdue` is a time-based label assigned outside the allocator; allocation only ever
/// produces the values of [`SettlementStatus`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstallmentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl InstallmentStatus {
    /// Statuses loaded when looking for installments a payment can go to.
    pub const UNPAID: [InstallmentStatus; 3] = [
        InstallmentStatus::Pending,
        InstallmentStatus::Partial,
        InstallmentStatus::Overdue,
    ];

    pub fn is_unpaid(self) -> bool {
        Self::UNPAID.contains(&self)
    }
}

/// Status derived from how much of an installment has been paid.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementStatus {
    Pending,
    Partial,
    Paid,
}

impl SettlementStatus {
    /// Derives the status from the nominal amount and the cumulative paid amount.
    pub fn derive(amount: Decimal, paid_amount: Decimal) -> Self {
        if paid_amount >= amount {
            SettlementStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            SettlementStatus::Partial
        } else {
            SettlementStatus::Pending
        }
    }
}

impl From<SettlementStatus> for InstallmentStatus {
    fn from(status: SettlementStatus) -> Self {
        match status {
            SettlementStatus::Pending => InstallmentStatus::Pending,
            SettlementStatus::Partial => InstallmentStatus::Partial,
            SettlementStatus::Paid => InstallmentStatus::Paid,
        }
    }
}

/// A credit plan, the owner of a set of installments.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct CreditPlan {
    pub id: String,
    pub client_id: String,
}

/// One scheduled sub-payment of a credit plan.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Installment {
    pub id: String,
    pub plan_id: String,
    /// 1-based position within the plan.
    pub installment_number: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_amount: Decimal,
    pub status: InstallmentStatus,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    pub fn new(
        id: impl Into<String>,
        plan_id: impl Into<String>,
        installment_number: u32,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            plan_id: plan_id.into(),
            installment_number,
            amount,
            due_date,
            paid_amount: Decimal::ZERO,
            status: InstallmentStatus::Pending,
            paid_at: None,
        }
    }

    /// Sets the amount already paid and the matching derived status.
    pub fn with_paid_amount(mut self, paid_amount: Decimal) -> Self {
        self.paid_amount = paid_amount;
        self.status = SettlementStatus::derive(self.amount, paid_amount).into();
        self
    }

    /// Amount still owed. Negative when the row has been over-paid.
    pub fn balance(&self) -> Decimal {
        self.amount - self.paid_amount
    }

    /// Amount still owed, never below zero.
    pub fn outstanding(&self) -> Decimal {
        self.balance().max(Decimal::ZERO)
    }

    /// Whether the installment fell due strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today
    }

    /// Checks `amount >= 0` and `0 <= paid_amount <= amount`.
    pub fn validate(&self) -> Result<()> {
        if self.amount < Decimal::ZERO {
            return Err(PaymentError::ValidationError(format!(
                "Installment {} has a negative amount",
                self.id
            )));
        }
        if self.paid_amount < Decimal::ZERO {
            return Err(PaymentError::ValidationError(format!(
                "Installment {} has a negative paid amount",
                self.id
            )));
        }
        if self.paid_amount > self.amount {
            return Err(PaymentError::ValidationError(format!(
                "Installment {} paid amount {} exceeds amount {}",
                self.id, self.paid_amount, self.amount
            )));
        }
        Ok(())
    }

    /// Writes an allocation result onto the stored row.
    pub fn apply(&mut self, update: &UpdatedInstallment) {
        self.paid_amount = update.paid_amount;
        self.status = update.status.into();
        if update.paid_at.is_some() {
            self.paid_at = update.paid_at;
        }
    }
}

/// New state of an installment that received part of a payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct UpdatedInstallment {
    pub id: String,
    /// New cumulative paid amount.
    pub paid_amount: Decimal,
    pub status: SettlementStatus,
    /// Present only when `status` is `Paid`.
    pub paid_at: Option<DateTime<Utc>>,
}
