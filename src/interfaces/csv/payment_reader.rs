use crate::domain::payment::PaymentRequest;
use crate::error::{PaymentError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of the payments file: `client, amount, payment_date, notes, receipt_url`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentRow {
    pub client: String,
    pub amount: Decimal,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

impl From<PaymentRow> for PaymentRequest {
    fn from(row: PaymentRow) -> Self {
        PaymentRequest {
            client_id: row.client,
            amount: row.amount,
            payment_date: row.payment_date,
            notes: row.notes,
            receipt_url: row.receipt_url,
        }
    }
}

/// Reads payment requests from a CSV source.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields requests in file order.
    pub fn payments(self) -> impl Iterator<Item = Result<PaymentRequest>> {
        self.reader
            .into_deserialize::<PaymentRow>()
            .map(|result| result.map(PaymentRequest::from).map_err(PaymentError::from))
    }
}
