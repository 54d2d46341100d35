use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_many_clients_and_payments() {
    let dir = tempdir().unwrap();
    let installments = dir.path().join("installments.csv");
    let payments = dir.path().join("payments.csv");
    common::generate_installments_csv(&installments, 200, 6).expect("Failed to generate CSV");
    common::generate_payments_csv(&payments, 200, 2_000).expect("Failed to generate CSV");

    let output = Command::new(cargo_bin!("duefirst"))
        .arg(&installments)
        .arg(&payments)
        .arg("--today")
        .arg("2024-04-01")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Binary failed on generated input");

    // Every receipt row must conserve the payment.
    let mut reader = csv::Reader::from_reader(output.stdout.as_slice());
    for record in reader.records() {
        let record = record.unwrap();
        let amount: rust_decimal::Decimal = record[2].parse().unwrap();
        let applied: rust_decimal::Decimal = record[3].parse().unwrap();
        let remaining: rust_decimal::Decimal = record[4].parse().unwrap();
        assert_eq!(applied + remaining, amount);
    }
}
