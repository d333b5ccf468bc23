use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{Invariant, LoanError, Result};
use crate::types::PaymentAllocation;

use super::Installment;

/// how to treat an amount beyond the total outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationMode {
    /// reject the whole payment if it exceeds what is owed
    Strict,
    /// apply what is owed and surface the remainder to the caller
    Lenient,
}

/// apply a payment across unpaid lines in waterfall order:
/// fees/penalties oldest-first, then interest, then principal.
/// Superseded lines are skipped. Never allocates more to a line than
/// its remaining due for that bucket.
pub fn allocate(
    lines: &mut [Installment],
    amount: Money,
    payment_date: NaiveDate,
    mode: AllocationMode,
) -> Result<PaymentAllocation> {
    if !amount.is_positive() {
        return Err(Invariant::InvalidAmount {
            field: "payment amount",
            amount,
        }
        .into());
    }

    let outstanding: Money = lines
        .iter()
        .filter(|l| !l.superseded)
        .map(|l| l.outstanding_total())
        .sum();

    if mode == AllocationMode::Strict && amount > outstanding {
        return Err(LoanError::InvariantViolation(
            Invariant::OverpaymentExceedsOutstanding {
                outstanding,
                submitted: amount,
            },
        ));
    }

    let mut remaining = amount;
    let mut allocation = PaymentAllocation::default();

    // active lines in due-date order; generation emits them ordered but a
    // restructure may have appended a younger schedule behind an older one
    let mut order: Vec<usize> = (0..lines.len())
        .filter(|&i| !lines[i].superseded && !lines[i].is_paid)
        .collect();
    order.sort_by_key(|&i| (lines[i].due_date, lines[i].number));

    for bucket in [Bucket::Fees, Bucket::Interest, Bucket::Principal] {
        for &i in &order {
            if remaining.is_zero() {
                break;
            }
            let line = &mut lines[i];
            let due = match bucket {
                Bucket::Fees => line.outstanding_fees(),
                Bucket::Interest => line.outstanding_interest(),
                Bucket::Principal => line.outstanding_principal(),
            };
            if due.is_zero() {
                continue;
            }

            let applied = remaining.min(due);
            match bucket {
                Bucket::Fees => {
                    line.paid_fees += applied;
                    allocation.to_fees += applied;
                }
                Bucket::Interest => {
                    line.paid_interest += applied;
                    allocation.to_interest += applied;
                }
                Bucket::Principal => {
                    line.paid_principal += applied;
                    allocation.to_principal += applied;
                }
            }
            remaining -= applied;
            line.refresh_paid_flag(payment_date);
        }
    }

    allocation.unapplied = remaining;
    Ok(allocation)
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Fees,
    Interest,
    Principal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn line(number: u32, due: (i32, u32, u32), principal: i64, interest: i64, fees: i64) -> Installment {
        Installment {
            id: Uuid::new_v4(),
            number,
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            scheduled_principal: Money::from_major(principal),
            scheduled_interest: Money::from_major(interest),
            scheduled_fees: Money::from_major(fees),
            paid_fees: Money::ZERO,
            paid_interest: Money::ZERO,
            paid_principal: Money::ZERO,
            paid_date: None,
            is_paid: false,
            superseded: false,
        }
    }

    fn pay_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_penalty_first_then_interest_then_principal() {
        // overdue line carries a $50 penalty; $1,066.19 payment clears the
        // penalty first, then interest, then principal
        let mut lines = vec![
            line(1, (2024, 2, 1), 946, 120, 50),
            line(2, (2024, 3, 1), 956, 110, 0),
        ];

        let alloc = allocate(
            &mut lines,
            Money::from_cents(106_619),
            pay_date(),
            AllocationMode::Lenient,
        )
        .unwrap();

        assert_eq!(alloc.to_fees, Money::from_major(50));
        assert_eq!(alloc.to_interest, Money::from_major(230));
        assert_eq!(alloc.to_principal, Money::from_cents(78_619));
        assert_eq!(alloc.unapplied, Money::ZERO);

        // oldest line's penalty is fully paid
        assert_eq!(lines[0].outstanding_fees(), Money::ZERO);
        // interest cleared oldest-first across both lines
        assert_eq!(lines[0].outstanding_interest(), Money::ZERO);
        assert_eq!(lines[1].outstanding_interest(), Money::ZERO);
    }

    #[test]
    fn test_allocation_reconciles_with_submitted() {
        let mut lines = vec![line(1, (2024, 2, 1), 100, 10, 5)];
        let submitted = Money::from_major(500);
        let alloc = allocate(&mut lines, submitted, pay_date(), AllocationMode::Lenient).unwrap();

        assert_eq!(alloc.total_submitted(), submitted);
        assert_eq!(alloc.unapplied, Money::from_major(385));
        assert!(lines[0].is_paid);
        assert_eq!(lines[0].paid_date, Some(pay_date()));
    }

    #[test]
    fn test_strict_mode_rejects_overpayment() {
        let mut lines = vec![line(1, (2024, 2, 1), 100, 10, 0)];
        let before = lines.clone();

        let err = allocate(
            &mut lines,
            Money::from_major(200),
            pay_date(),
            AllocationMode::Strict,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            LoanError::InvariantViolation(Invariant::OverpaymentExceedsOutstanding { .. })
        ));
        // rejected operation leaves lines untouched
        assert_eq!(lines, before);
    }

    #[test]
    fn test_oldest_line_first_within_bucket() {
        let mut lines = vec![
            line(2, (2024, 3, 1), 100, 10, 0),
            line(1, (2024, 2, 1), 100, 10, 0),
        ];

        // only enough for one line's interest
        let alloc = allocate(&mut lines, Money::from_major(10), pay_date(), AllocationMode::Lenient)
            .unwrap();

        assert_eq!(alloc.to_interest, Money::from_major(10));
        // the February line got it, not the March line
        assert_eq!(lines[1].outstanding_interest(), Money::ZERO);
        assert_eq!(lines[0].outstanding_interest(), Money::from_major(10));
    }

    #[test]
    fn test_superseded_lines_skipped() {
        let mut old = line(1, (2024, 2, 1), 100, 10, 0);
        old.superseded = true;
        let mut lines = vec![old, line(1, (2024, 4, 1), 80, 8, 0)];

        let alloc = allocate(&mut lines, Money::from_major(88), pay_date(), AllocationMode::Lenient)
            .unwrap();

        assert_eq!(alloc.to_interest, Money::from_major(8));
        assert_eq!(alloc.to_principal, Money::from_major(80));
        assert_eq!(lines[0].paid_amount(), Money::ZERO);
        assert!(lines[1].is_paid);
    }

    #[test]
    fn test_zero_payment_rejected() {
        let mut lines = vec![line(1, (2024, 2, 1), 100, 10, 0)];
        assert!(allocate(&mut lines, Money::ZERO, pay_date(), AllocationMode::Lenient).is_err());
    }
}
