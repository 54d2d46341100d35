use super::installment::{Installment, InstallmentStatus, UpdatedInstallment};
use super::money::Amount;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_NOTES_LEN: usize = 500;

/// An incoming payment as submitted by an operator.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRequest {
    pub client_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Link to a scanned receipt or transfer voucher.
    #[serde(default)]
    pub receipt_url: Option<String>,
}

impl PaymentRequest {
    pub fn new(client_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            client_id: client_id.into(),
            amount,
            payment_date: None,
            notes: None,
            receipt_url: None,
        }
    }

    /// Rejects requests that must never reach the allocator.
    pub fn validate(&self) -> Result<Amount> {
        if self.client_id.trim().is_empty() {
            return Err(PaymentError::validation("Client id is required"));
        }
        if let Some(notes) = &self.notes
            && notes.chars().count() > MAX_NOTES_LEN
        {
            return Err(PaymentError::validation(format!(
                "Notes must be at most {MAX_NOTES_LEN} characters"
            )));
        }
        if let Some(url) = self.receipt_url.as_deref().filter(|url| !url.is_empty())
            && !is_web_url(url)
        {
            return Err(PaymentError::validation(format!("Invalid receipt URL: {url}")));
        }
        Amount::new(self.amount)
    }
}

fn is_web_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !rest.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// A persisted payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRecord {
    pub id: String,
    pub client_id: String,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    /// Plan of the first installment the payment reached.
    pub plan_id: Option<String>,
    /// First installment the payment reached.
    pub installment_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// How much of a payment went to one installment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AllocationEntry {
    pub payment_id: String,
    pub installment_id: String,
    pub amount_applied: Decimal,
}

/// Builds the allocation ledger for a payment.
///
/// The applied amount is the new paid amount minus the one before the payment. Entries
/// that applied nothing are dropped.
pub fn allocation_entries(
    payment_id: &str,
    before: &[Installment],
    updated: &[UpdatedInstallment],
) -> Vec<AllocationEntry> {
    let previous: HashMap<&str, Decimal> = before
        .iter()
        .map(|installment| (installment.id.as_str(), installment.paid_amount))
        .collect();

    updated
        .iter()
        .map(|update| AllocationEntry {
            payment_id: payment_id.to_string(),
            installment_id: update.id.clone(),
            amount_applied: update.paid_amount
                - previous
                    .get(update.id.as_str())
                    .copied()
                    .unwrap_or(Decimal::ZERO),
        })
        .filter(|entry| entry.amount_applied > Decimal::ZERO)
        .collect()
}

/// Audit trail entry for a recorded payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AuditEntry {
    pub entity_id: String,
    pub client_id: String,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub applied_installments: Vec<String>,
    pub total_applied: Decimal,
    pub remaining_amount: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Result reported back to the operator after recording a payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub client_id: String,
    pub amount: Decimal,
    pub amount_applied: Decimal,
    pub remaining_amount: Decimal,
    pub installments_updated: usize,
    /// How many of the reached installments were past due.
    pub overdue_installments: usize,
    /// Date the allocation treated as today.
    pub as_of: NaiveDate,
    pub allocations: Vec<AllocationEntry>,
}

/// One installment a previewed payment would reach.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PreviewLine {
    pub id: String,
    pub installment_number: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_amount: Decimal,
    pub status: InstallmentStatus,
    pub overdue: bool,
    pub amount_to_apply: Decimal,
}

/// Dry-run allocation of a payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentPreview {
    pub client_id: String,
    pub amount: Decimal,
    pub as_of: NaiveDate,
    pub installments: Vec<PreviewLine>,
    pub remaining_amount: Decimal,
}

impl PaymentPreview {
    /// Never exceeds `amount`, so the sum stays in range.
    pub fn amount_applied(&self) -> Decimal {
        self.installments
            .iter()
            .fold(Decimal::ZERO, |total, line| {
                total.saturating_add(line.amount_to_apply)
            })
    }

    pub fn overdue_count(&self) -> usize {
        self.installments.iter().filter(|line| line.overdue).count()
    }
}
