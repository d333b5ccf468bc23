use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{Invariant, LoanError, Result};
use crate::events::{Event, EventStore};
use crate::types::{CaseId, PromiseId, PromiseStatus};

/// a debtor's commitment to pay an amount by a date. Payments accumulate
/// against it; the verdict (kept, partially kept, broken) is only settled
/// once the promised amount arrives or the promised date passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromiseToPay {
    pub id: PromiseId,
    pub case_id: CaseId,
    pub promised_amount: Money,
    pub promised_date: NaiveDate,
    pub amount_paid: Money,
    pub status: PromiseStatus,
    pub recorded_date: NaiveDate,
    pub reschedule_count: u32,
    pub notes: Option<String>,
}

impl PromiseToPay {
    pub fn new(
        case_id: CaseId,
        promised_amount: Money,
        promised_date: NaiveDate,
        recorded_date: NaiveDate,
        notes: Option<String>,
    ) -> Result<Self> {
        if !promised_amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "promised amount",
                amount: promised_amount,
            }
            .into());
        }
        if promised_date < recorded_date {
            return Err(LoanError::InvalidConfiguration {
                message: format!("promised date {promised_date} is already in the past"),
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            case_id,
            promised_amount,
            promised_date,
            amount_paid: Money::ZERO,
            status: PromiseStatus::Active,
            recorded_date,
            reschedule_count: 0,
            notes,
        })
    }

    fn guard_active(&self, operation: &'static str) -> Result<()> {
        if self.status == PromiseStatus::Active {
            Ok(())
        } else {
            Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            })
        }
    }

    /// credit a payment against the promise. Reaching the promised amount
    /// marks it kept; a shortfall keeps it active until the promised date
    /// passes.
    pub fn record_payment(
        &mut self,
        amount: Money,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard_active("record_promise_payment")?;
        if !amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "promise payment",
                amount,
            }
            .into());
        }

        self.amount_paid += amount;
        if self.amount_paid >= self.promised_amount {
            self.status = PromiseStatus::Kept;
            events.emit(Event::PromiseKept {
                promise_id: self.id,
                amount_paid: self.amount_paid,
                timestamp: time.now(),
            });
        }
        Ok(())
    }

    /// rule the promise broken. Only allowed once the promised date has
    /// passed; a partial payment downgrades the verdict to PartiallyKept.
    pub fn mark_broken(
        &mut self,
        reason: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard_active("mark_promise_broken")?;
        let today = time.now().date_naive();
        if today <= self.promised_date {
            return Err(Invariant::PromiseNotYetDue {
                promised_date: self.promised_date,
            }
            .into());
        }

        self.status = if self.amount_paid.is_positive() {
            PromiseStatus::PartiallyKept
        } else {
            PromiseStatus::Broken
        };
        events.emit(Event::PromiseBroken {
            promise_id: self.id,
            reason,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// move the promised date out, keeping the commitment alive
    pub fn reschedule(&mut self, new_date: NaiveDate, time: &SafeTimeProvider) -> Result<()> {
        self.guard_active("reschedule_promise")?;
        if new_date <= self.promised_date || new_date < time.now().date_naive() {
            return Err(LoanError::InvalidConfiguration {
                message: format!("reschedule date {new_date} must move the promise forward"),
            });
        }
        self.promised_date = new_date;
        self.reschedule_count += 1;
        Ok(())
    }

    pub fn shortfall(&self) -> Money {
        self.promised_amount.saturating_sub(self.amount_paid)
    }
}
