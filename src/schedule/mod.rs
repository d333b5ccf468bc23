pub mod amortization;
pub mod waterfall;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::InstallmentId;

pub use amortization::{add_months, generate, PlannedInstallment, ScheduleTerms};
pub use waterfall::{allocate, AllocationMode};

/// one installment line in a loan's repayment ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub number: u32,
    pub due_date: NaiveDate,
    pub scheduled_principal: Money,
    pub scheduled_interest: Money,
    /// fees and penalties charged against this line after generation
    pub scheduled_fees: Money,
    pub paid_fees: Money,
    pub paid_interest: Money,
    pub paid_principal: Money,
    pub paid_date: Option<NaiveDate>,
    pub is_paid: bool,
    /// retained for audit after a restructure replaces the active schedule
    pub superseded: bool,
}

impl Installment {
    pub fn from_planned(line: &PlannedInstallment) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: line.number,
            due_date: line.due_date,
            scheduled_principal: line.principal,
            scheduled_interest: line.interest,
            scheduled_fees: Money::ZERO,
            paid_fees: Money::ZERO,
            paid_interest: Money::ZERO,
            paid_principal: Money::ZERO,
            paid_date: None,
            is_paid: false,
            superseded: false,
        }
    }

    pub fn total_scheduled(&self) -> Money {
        self.scheduled_principal + self.scheduled_interest + self.scheduled_fees
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_fees + self.paid_interest + self.paid_principal
    }

    pub fn outstanding_fees(&self) -> Money {
        self.scheduled_fees - self.paid_fees
    }

    pub fn outstanding_interest(&self) -> Money {
        self.scheduled_interest - self.paid_interest
    }

    pub fn outstanding_principal(&self) -> Money {
        self.scheduled_principal - self.paid_principal
    }

    pub fn outstanding_total(&self) -> Money {
        self.total_scheduled() - self.paid_amount()
    }

    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_paid && !self.superseded && self.due_date < as_of
    }

    /// settle the paid flag after an allocation touched this line
    pub(crate) fn refresh_paid_flag(&mut self, payment_date: NaiveDate) {
        if self.outstanding_total().is_zero() {
            self.is_paid = true;
            self.paid_date = Some(payment_date);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::types::{InterestMethod, RepaymentFrequency};

    #[test]
    fn test_installment_from_planned() {
        let terms = ScheduleTerms {
            principal: Money::from_major(1_000),
            annual_rate: Rate::from_percentage(10),
            term_months: 10,
            frequency: RepaymentFrequency::Monthly,
            method: InterestMethod::Flat,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            grace_periods: 0,
        };
        let planned = generate(&terms).unwrap();
        let line = Installment::from_planned(&planned[0]);

        assert_eq!(line.number, 1);
        assert_eq!(line.scheduled_principal, Money::from_major(100));
        assert_eq!(line.outstanding_total(), line.total_scheduled());
        assert!(!line.is_paid);
        assert!(!line.superseded);
    }

    #[test]
    fn test_overdue_only_before_due_date() {
        let mut line = Installment {
            id: Uuid::new_v4(),
            number: 1,
            due_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            scheduled_principal: Money::from_major(100),
            scheduled_interest: Money::from_major(10),
            scheduled_fees: Money::ZERO,
            paid_fees: Money::ZERO,
            paid_interest: Money::ZERO,
            paid_principal: Money::ZERO,
            paid_date: None,
            is_paid: false,
            superseded: false,
        };
        assert!(!line.is_overdue(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert!(line.is_overdue(NaiveDate::from_ymd_opt(2024, 2, 2).unwrap()));

        line.superseded = true;
        assert!(!line.is_overdue(NaiveDate::from_ymd_opt(2024, 2, 2).unwrap()));
    }
}
