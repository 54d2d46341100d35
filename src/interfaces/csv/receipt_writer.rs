use crate::domain::payment::{PaymentPreview, PaymentReceipt};
use crate::error::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Output row: `client,payment,amount,applied,remaining,installments,overdue,as_of`.
///
/// `payment` is empty for previews. `overdue` counts the reached installments that were
/// past due on `as_of`.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ReceiptRow {
    pub client: String,
    pub payment: String,
    pub amount: Decimal,
    pub applied: Decimal,
    pub remaining: Decimal,
    pub installments: usize,
    pub overdue: usize,
    pub as_of: NaiveDate,
}

impl From<&PaymentReceipt> for ReceiptRow {
    fn from(receipt: &PaymentReceipt) -> Self {
        Self {
            client: receipt.client_id.clone(),
            payment: receipt.payment_id.clone(),
            amount: receipt.amount.normalize(),
            applied: receipt.amount_applied.normalize(),
            remaining: receipt.remaining_amount.normalize(),
            installments: receipt.installments_updated,
            overdue: receipt.overdue_installments,
            as_of: receipt.as_of,
        }
    }
}

impl From<&PaymentPreview> for ReceiptRow {
    fn from(preview: &PaymentPreview) -> Self {
        Self {
            client: preview.client_id.clone(),
            payment: String::new(),
            amount: preview.amount.normalize(),
            applied: preview.amount_applied().normalize(),
            remaining: preview.remaining_amount.normalize(),
            installments: preview.installments.len(),
            overdue: preview.overdue_count(),
            as_of: preview.as_of,
        }
    }
}

/// Writes receipt rows as CSV.
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, row: &ReceiptRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_normalized_rows() {
        let receipt = PaymentReceipt {
            payment_id: "pay-1".to_string(),
            client_id: "c1".to_string(),
            amount: dec!(150.00),
            amount_applied: dec!(100.00),
            remaining_amount: dec!(50.00),
            installments_updated: 1,
            overdue_installments: 1,
            as_of: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            allocations: Vec::new(),
        };
        let preview = PaymentPreview {
            client_id: "c2".to_string(),
            amount: dec!(20.50),
            as_of: NaiveDate::from_ymd_opt(2024, 6, 11).unwrap(),
            installments: Vec::new(),
            remaining_amount: Decimal::ZERO,
        };

        let mut buffer = Vec::new();
        {
            let mut writer = ReceiptWriter::new(&mut buffer);
            writer.write(&ReceiptRow::from(&receipt)).unwrap();
            writer.write(&ReceiptRow::from(&preview)).unwrap();
            writer.flush().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines[0],
            "client,payment,amount,applied,remaining,installments,overdue,as_of"
        );
        assert_eq!(lines[1], "c1,pay-1,150,100,50,1,1,2024-06-10");
        assert_eq!(lines[2], "c2,,20.5,0,0,0,0,2024-06-11");
    }
}
