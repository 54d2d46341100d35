use crate::domain::installment::{CreditPlan, Installment, InstallmentStatus, SettlementStatus};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::io::Read;

/// One row of the installments file.
///
/// Columns: `client, plan, id, number, amount, due_date, paid_amount, status`.
/// Empty `paid_amount` means nothing paid yet; empty `status` is derived from the amounts.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct InstallmentRecord {
    pub client: String,
    pub plan: String,
    pub id: String,
    pub number: u32,
    pub amount: Decimal,
    #[serde(deserialize_with = "deserialize_due_date")]
    pub due_date: NaiveDate,
    #[serde(default)]
    pub paid_amount: Option<Decimal>,
    #[serde(default)]
    pub status: Option<InstallmentStatus>,
}

impl InstallmentRecord {
    pub fn into_parts(self) -> (CreditPlan, Installment) {
        let paid_amount = self.paid_amount.unwrap_or(Decimal::ZERO);
        let status = self
            .status
            .unwrap_or_else(|| SettlementStatus::derive(self.amount, paid_amount).into());

        let plan = CreditPlan {
            id: self.plan.clone(),
            client_id: self.client,
        };
        let installment = Installment {
            id: self.id,
            plan_id: self.plan,
            installment_number: self.number,
            amount: self.amount,
            due_date: self.due_date,
            paid_amount,
            status,
            paid_at: None,
        };
        (plan, installment)
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, keeping the calendar date.
fn deserialize_due_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_due_date(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_due_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.date_naive()))
        .map_err(|_| format!("invalid due date: {raw:?}"))
}

/// Reads installments from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating short rows.
pub struct InstallmentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> InstallmentReader<R> {
    /// Creates a new `InstallmentReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes rows.
    pub fn records(self) -> impl Iterator<Item = Result<InstallmentRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
