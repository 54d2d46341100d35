use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a positive monetary amount for an incoming payment.
///
/// Payments of zero or less are rejected before they reach the allocator.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Sums the non-negative part of each value.
///
/// Used for outstanding balances, where an over-paid row contributes nothing. Fails
/// instead of overflowing when the total leaves the `Decimal` range.
pub fn sum_positive<I>(values: I) -> Result<Decimal, PaymentError>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |total, value| {
        total
            .checked_add(value.max(Decimal::ZERO))
            .ok_or_else(|| PaymentError::validation("Total exceeds the supported amount range"))
    })
}
