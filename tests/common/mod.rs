#![allow(dead_code)]

use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const INSTALLMENT_HEADER: [&str; 8] = [
    "client",
    "plan",
    "id",
    "number",
    "amount",
    "due_date",
    "paid_amount",
    "status",
];

pub const PAYMENT_HEADER: [&str; 4] = ["client", "amount", "payment_date", "notes"];

/// One plan per client with `per_client` monthly installments of 100.
pub fn generate_installments_csv(path: &Path, clients: usize, per_client: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(INSTALLMENT_HEADER)?;

    for client in 1..=clients {
        for number in 1..=per_client {
            let month = (number - 1) % 12 + 1;
            wtr.write_record([
                format!("c{client}").as_str(),
                format!("p{client}").as_str(),
                format!("p{client}-{number}").as_str(),
                number.to_string().as_str(),
                "100.00",
                format!("2024-{month:02}-10").as_str(),
                "",
                "",
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// `rows` payments spread over `clients` clients with random amounts.
pub fn generate_payments_csv(path: &Path, clients: usize, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(PAYMENT_HEADER)?;

    let mut rng = rand::thread_rng();
    for _ in 0..rows {
        let client = rng.gen_range(1..=clients);
        let cents: u32 = rng.gen_range(1..=25_000);
        wtr.write_record([
            format!("c{client}").as_str(),
            format!("{}.{:02}", cents / 100, cents % 100).as_str(),
            "",
            "",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
