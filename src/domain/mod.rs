//! Domain types and the pure allocation logic.

pub mod allocation;
pub mod clock;
pub mod installment;
pub mod money;
pub mod payment;
pub mod ports;
