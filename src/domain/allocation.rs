//! Oldest-due-first payment allocation.
//!
//! Overdue installments are served before upcoming ones, and within each group the
//! earliest due date goes first. Everything here is pure: no I/O and no shared state.

use super::clock::Clock;
use super::installment::{Installment, SettlementStatus, UpdatedInstallment};
use super::money::sum_positive;
use crate::error::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of distributing one payment over a set of installments.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct PaymentApplicationResult {
    /// Touched installments, in the order they were served.
    pub updated_installments: Vec<UpdatedInstallment>,
    /// Part of the payment no installment could absorb.
    pub remaining_amount: Decimal,
}

/// Orders installments overdue first, then upcoming, each ascending by due date.
///
/// An installment due on `today` is upcoming. Equal due dates keep their input order.
pub fn sort_by_due_priority(installments: &[Installment], today: NaiveDate) -> Vec<Installment> {
    let (mut overdue, mut upcoming): (Vec<Installment>, Vec<Installment>) = installments
        .iter()
        .cloned()
        .partition(|installment| installment.is_overdue(today));

    // sort_by_key is stable; same-day installments must not swap.
    overdue.sort_by_key(|installment| installment.due_date);
    upcoming.sort_by_key(|installment| installment.due_date);

    overdue.extend(upcoming);
    overdue
}

/// Applies `payment_amount` to `installments` in due-priority order.
///
/// Input order does not matter. Installments with nothing left to pay are skipped
/// without consuming any of the payment; installments never reached are left out of
/// the result.
pub fn apply_payment<C>(
    payment_amount: Decimal,
    installments: &[Installment],
    clock: &C,
) -> PaymentApplicationResult
where
    C: Clock + ?Sized,
{
    let sorted = sort_by_due_priority(installments, clock.today());
    let allocated_at = clock.now();

    let mut updated_installments = Vec::new();
    let mut remaining = payment_amount;

    for installment in &sorted {
        if remaining <= Decimal::ZERO {
            break;
        }

        let balance = installment.balance();
        if balance <= Decimal::ZERO {
            continue;
        }

        let amount_to_apply = remaining.min(balance);
        let paid_amount = installment.paid_amount + amount_to_apply;
        let status = SettlementStatus::derive(installment.amount, paid_amount);
        let paid_at = (status == SettlementStatus::Paid).then_some(allocated_at);

        updated_installments.push(UpdatedInstallment {
            id: installment.id.clone(),
            paid_amount,
            status,
            paid_at,
        });

        remaining -= amount_to_apply;
    }

    PaymentApplicationResult {
        updated_installments,
        remaining_amount: remaining,
    }
}

/// Total unpaid balance; over-paid rows contribute zero.
///
/// Errors when the total does not fit in a `Decimal`.
pub fn total_outstanding(installments: &[Installment]) -> Result<Decimal> {
    sum_positive(installments.iter().map(Installment::balance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock::on(today())
    }

    fn due_in(days: i64) -> NaiveDate {
        today() + chrono::Duration::days(days)
    }

    fn installment(id: &str, amount: Decimal, due_in_days: i64) -> Installment {
        Installment::new(id, "plan-1", 1, amount, due_in(due_in_days))
    }

    fn ids(installments: &[Installment]) -> Vec<&str> {
        installments.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_sort_overdue_before_upcoming() {
        let installments = vec![
            installment("tomorrow", dec!(100), 1),
            installment("yesterday", dec!(100), -1),
            installment("next_week", dec!(100), 7),
        ];

        let sorted = sort_by_due_priority(&installments, today());
        assert_eq!(ids(&sorted), vec!["yesterday", "tomorrow", "next_week"]);
    }

    #[test]
    fn test_sort_oldest_overdue_first() {
        let installments = vec![
            installment("two_days", dec!(100), -2),
            installment("five_days", dec!(100), -5),
            installment("one_day", dec!(100), -1),
        ];

        let sorted = sort_by_due_priority(&installments, today());
        assert_eq!(ids(&sorted), vec!["five_days", "two_days", "one_day"]);
    }

    #[test]
    fn test_sort_due_today_is_upcoming() {
        let installments = vec![
            installment("today", dec!(100), 0),
            installment("overdue", dec!(100), -3),
            installment("today_too", dec!(100), 0),
        ];

        let sorted = sort_by_due_priority(&installments, today());
        assert_eq!(ids(&sorted), vec!["overdue", "today", "today_too"]);
    }

    #[test]
    fn test_sort_keeps_input_order_for_equal_dates() {
        let mut later_number = installment("b", dec!(100), 3);
        later_number.installment_number = 2;
        let mut earlier_number = installment("a", dec!(100), 3);
        earlier_number.installment_number = 1;

        let sorted = sort_by_due_priority(&[later_number, earlier_number], today());
        assert_eq!(ids(&sorted), vec!["b", "a"]);
    }

    #[test]
    fn test_sort_empty_and_single() {
        assert!(sort_by_due_priority(&[], today()).is_empty());

        let single = vec![installment("only", dec!(10), -4)];
        assert_eq!(sort_by_due_priority(&single, today()), single);
    }

    #[test]
    fn test_full_payment_of_single_installment() {
        let result = apply_payment(dec!(100), &[installment("a", dec!(100), 5)], &clock());

        assert_eq!(result.updated_installments.len(), 1);
        let update = &result.updated_installments[0];
        assert_eq!(update.paid_amount, dec!(100));
        assert_eq!(update.status, SettlementStatus::Paid);
        assert_eq!(update.paid_at, Some(clock().now()));
        assert_eq!(result.remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_partial_payment() {
        let result = apply_payment(dec!(50), &[installment("a", dec!(100), 5)], &clock());

        let update = &result.updated_installments[0];
        assert_eq!(update.paid_amount, dec!(50));
        assert_eq!(update.status, SettlementStatus::Partial);
        assert_eq!(update.paid_at, None);
        assert_eq!(result.remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_overdue_served_before_upcoming() {
        let installments = vec![
            installment("upcoming", dec!(100), 1),
            installment("overdue", dec!(100), -1),
        ];

        let result = apply_payment(dec!(150), &installments, &clock());

        assert_eq!(result.updated_installments.len(), 2);
        let first = &result.updated_installments[0];
        assert_eq!(first.id, "overdue");
        assert_eq!(first.paid_amount, dec!(100));
        assert_eq!(first.status, SettlementStatus::Paid);

        let second = &result.updated_installments[1];
        assert_eq!(second.id, "upcoming");
        assert_eq!(second.paid_amount, dec!(50));
        assert_eq!(second.status, SettlementStatus::Partial);
        assert_eq!(result.remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_completes_partially_paid_installment() {
        let partial = installment("a", dec!(100), 2).with_paid_amount(dec!(30));
        let result = apply_payment(dec!(70), &[partial], &clock());

        let update = &result.updated_installments[0];
        assert_eq!(update.paid_amount, dec!(100));
        assert_eq!(update.status, SettlementStatus::Paid);
        assert_eq!(result.remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_overpayment_leaves_remainder() {
        let result = apply_payment(dec!(150), &[installment("a", dec!(100), 2)], &clock());

        let update = &result.updated_installments[0];
        assert_eq!(update.paid_amount, dec!(100));
        assert_eq!(update.status, SettlementStatus::Paid);
        assert_eq!(result.remaining_amount, dec!(50));
    }

    #[test]
    fn test_skips_paid_installments() {
        let installments = vec![
            installment("paid", dec!(100), -10).with_paid_amount(dec!(100)),
            installment("open", dec!(100), 10),
        ];

        let result = apply_payment(dec!(100), &installments, &clock());

        assert_eq!(result.updated_installments.len(), 1);
        let update = &result.updated_installments[0];
        assert_eq!(update.id, "open");
        assert_eq!(update.paid_amount, dec!(100));
        assert_eq!(update.status, SettlementStatus::Paid);
        assert_eq!(result.remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_zero_payment_touches_nothing() {
        let result = apply_payment(Decimal::ZERO, &[installment("a", dec!(100), 0)], &clock());
        assert!(result.updated_installments.is_empty());
        assert_eq!(result.remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_payment_exhausted_leaves_later_installments_out() {
        let installments = vec![
            installment("first", dec!(100), -2),
            installment("second", dec!(100), -1),
            installment("third", dec!(100), 4),
        ];

        let result = apply_payment(dec!(100), &installments, &clock());
        assert_eq!(result.updated_installments.len(), 1);
        assert_eq!(result.updated_installments[0].id, "first");
    }

    #[test]
    fn test_same_day_tie_goes_to_first_in_input() {
        let installments = vec![
            installment("listed_first", dec!(100), 3),
            installment("listed_second", dec!(100), 3),
        ];

        let result = apply_payment(dec!(60), &installments, &clock());
        assert_eq!(result.updated_installments.len(), 1);
        assert_eq!(result.updated_installments[0].id, "listed_first");
    }

    #[test]
    fn test_overpaid_row_is_skipped() {
        let mut corrupt = installment("corrupt", dec!(100), -5);
        corrupt.paid_amount = dec!(130);
        let installments = vec![corrupt, installment("open", dec!(50), 1)];

        let result = apply_payment(dec!(80), &installments, &clock());
        assert_eq!(result.updated_installments.len(), 1);
        assert_eq!(result.updated_installments[0].id, "open");
        assert_eq!(result.remaining_amount, dec!(30));
    }

    #[test]
    fn test_total_outstanding() {
        let installments = vec![
            installment("a", dec!(100), -1).with_paid_amount(dec!(40)),
            installment("b", dec!(100), 1).with_paid_amount(dec!(100)),
            installment("c", dec!(25.50), 2),
        ];
        assert_eq!(total_outstanding(&installments).unwrap(), dec!(85.50));
        assert_eq!(total_outstanding(&[]).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_total_outstanding_out_of_range() {
        let huge = dec!(50000000000000000000000000000);
        let installments = vec![
            installment("a", huge, -1),
            installment("b", huge, 1),
        ];
        assert!(matches!(
            total_outstanding(&installments),
            Err(crate::error::PaymentError::ValidationError(_))
        ));

        // Allocation itself never sums balances and still works.
        let result = apply_payment(dec!(1), &installments, &clock());
        assert_eq!(result.updated_installments.len(), 1);
        assert_eq!(result.updated_installments[0].paid_amount, dec!(1));
    }
}
