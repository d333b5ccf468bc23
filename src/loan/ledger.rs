use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{Invariant, LoanError, Result};
use crate::schedule::{allocate, AllocationMode, Installment, PlannedInstallment};
use crate::types::PaymentAllocation;

/// the repayment ledger: one record per installment. Superseded lines
/// from before a restructure stay in place for audit; only active lines
/// participate in balances and allocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleLedger {
    lines: Vec<Installment>,
}

impl ScheduleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// append a freshly generated schedule as the active line set
    pub fn activate(&mut self, planned: &[PlannedInstallment]) {
        self.lines
            .extend(planned.iter().map(Installment::from_planned));
    }

    /// mark every active line superseded ahead of a replacement schedule
    pub fn supersede_active(&mut self) {
        for line in self.lines.iter_mut().filter(|l| !l.superseded) {
            line.superseded = true;
        }
    }

    pub fn lines(&self) -> &[Installment] {
        &self.lines
    }

    pub fn active_lines(&self) -> impl Iterator<Item = &Installment> {
        self.lines.iter().filter(|l| !l.superseded)
    }

    /// apply a payment through the waterfall against active lines
    pub fn receive_payment(
        &mut self,
        amount: Money,
        payment_date: NaiveDate,
        mode: AllocationMode,
    ) -> Result<PaymentAllocation> {
        allocate(&mut self.lines, amount, payment_date, mode)
    }

    /// charge a penalty/fee against the oldest unpaid overdue line
    pub fn charge_penalty(&mut self, amount: Money, as_of: NaiveDate) -> Result<()> {
        if !amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "penalty amount",
                amount,
            }
            .into());
        }
        let line = self
            .lines
            .iter_mut()
            .filter(|l| l.is_overdue(as_of))
            .min_by_key(|l| l.due_date)
            .ok_or(LoanError::InvalidConfiguration {
                message: "no overdue installment to charge a penalty against".to_string(),
            })?;
        line.scheduled_fees += amount;
        Ok(())
    }

    /// charge a one-off fee against the earliest unpaid active line
    pub fn charge_fee(&mut self, amount: Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "fee amount",
                amount,
            }
            .into());
        }
        let line = self
            .lines
            .iter_mut()
            .filter(|l| !l.superseded && !l.is_paid)
            .min_by_key(|l| l.due_date)
            .ok_or(LoanError::InvalidConfiguration {
                message: "no open installment to charge a fee against".to_string(),
            })?;
        line.scheduled_fees += amount;
        Ok(())
    }

    pub fn outstanding_fees(&self) -> Money {
        self.active_lines().map(|l| l.outstanding_fees()).sum()
    }

    pub fn outstanding_interest(&self) -> Money {
        self.active_lines().map(|l| l.outstanding_interest()).sum()
    }

    pub fn outstanding_principal(&self) -> Money {
        self.active_lines().map(|l| l.outstanding_principal()).sum()
    }

    pub fn total_outstanding(&self) -> Money {
        self.active_lines().map(|l| l.outstanding_total()).sum()
    }

    /// the loan is paid off when every active line is settled
    pub fn is_settled(&self) -> bool {
        self.active_lines().all(|l| l.is_paid)
    }

    pub fn overdue_lines(&self, as_of: NaiveDate) -> impl Iterator<Item = &Installment> {
        self.lines.iter().filter(move |l| l.is_overdue(as_of))
    }

    pub fn overdue_amount(&self, as_of: NaiveDate) -> Money {
        self.overdue_lines(as_of).map(|l| l.outstanding_total()).sum()
    }

    /// days since the oldest overdue line fell due; zero when current
    pub fn days_past_due(&self, as_of: NaiveDate) -> u32 {
        self.overdue_lines(as_of)
            .map(|l| (as_of - l.due_date).num_days().max(0) as u32)
            .max()
            .unwrap_or(0)
    }

    pub fn next_due(&self, as_of: NaiveDate) -> Option<&Installment> {
        self.active_lines()
            .filter(|l| !l.is_paid && l.due_date >= as_of)
            .min_by_key(|l| l.due_date)
    }
}
