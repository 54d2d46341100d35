//! CSV readers for installments and payments, and the receipt writer.

pub mod installment_reader;
pub mod payment_reader;
pub mod receipt_writer;
