use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{Invariant, LoanError, Result};
use crate::events::{Event, EventStore};
use crate::loan::Loan;
use crate::types::{Actor, LoanId, LoanStatus, WriteOffId, WriteOffStatus};

/// balance moved off the active ledger as uncollectible. Recoveries can
/// still be posted against it afterwards, capped at the written-off total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanWriteOff {
    pub id: WriteOffId,
    pub loan_id: LoanId,
    pub write_off_date: NaiveDate,
    pub principal_written_off: Money,
    pub interest_written_off: Money,
    pub fees_written_off: Money,
    pub recovered_amount: Money,
    pub status: WriteOffStatus,
    /// arrears depth at the moment of write-off
    pub days_past_due: u32,
    pub reason: String,
    pub approved_by: Actor,
}

impl LoanWriteOff {
    pub fn total_written_off(&self) -> Money {
        self.principal_written_off + self.interest_written_off + self.fees_written_off
    }

    pub fn outstanding_recovery(&self) -> Money {
        self.total_written_off() - self.recovered_amount
    }

    /// post a post-write-off recovery. The running total can never exceed
    /// the written-off total; reaching it flips the record to
    /// FullyRecovered.
    pub fn record_recovery(
        &mut self,
        amount: Money,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        if !amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "recovery amount",
                amount,
            }
            .into());
        }
        let total = self.total_written_off();
        if self.recovered_amount + amount > total {
            return Err(Invariant::RecoveryExceedsWriteOff {
                total,
                recovered: self.recovered_amount,
                attempted: amount,
            }
            .into());
        }

        self.recovered_amount += amount;
        events.emit(Event::RecoveryRecorded {
            write_off_id: self.id,
            loan_id: self.loan_id,
            amount,
            total_recovered: self.recovered_amount,
            timestamp: time.now(),
        });

        if self.recovered_amount == total {
            self.status = WriteOffStatus::FullyRecovered;
            info!(write_off_id = %self.id, "write-off fully recovered");
            events.emit(Event::WriteOffFullyRecovered {
                write_off_id: self.id,
                loan_id: self.loan_id,
                timestamp: time.now(),
            });
        }
        Ok(())
    }
}

/// write off a delinquent loan: capture the outstanding split, zero the
/// loan's active balances, supersede the open schedule and move the loan
/// to its terminal WrittenOff state
pub fn write_off(
    loan: &mut Loan,
    reason: String,
    approved_by: Actor,
    time: &SafeTimeProvider,
    events: &mut EventStore,
) -> Result<LoanWriteOff> {
    if loan.status != LoanStatus::Disbursed {
        return Err(LoanError::InvalidStateTransition {
            current: format!("{:?}", loan.status),
            operation: "write_off",
        });
    }

    let today = time.now().date_naive();
    let record = LoanWriteOff {
        id: Uuid::new_v4(),
        loan_id: loan.id,
        write_off_date: today,
        principal_written_off: loan.ledger.outstanding_principal(),
        interest_written_off: loan.ledger.outstanding_interest(),
        fees_written_off: loan.ledger.outstanding_fees(),
        recovered_amount: Money::ZERO,
        status: WriteOffStatus::Active,
        days_past_due: loan.days_past_due(today),
        reason: reason.clone(),
        approved_by,
    };

    loan.ledger.supersede_active();
    loan.outstanding_principal = Money::ZERO;
    loan.outstanding_interest = Money::ZERO;
    loan.status = LoanStatus::WrittenOff;

    warn!(
        loan_id = %loan.id,
        total = %record.total_written_off(),
        days_past_due = record.days_past_due,
        "loan written off"
    );
    events.emit(Event::LoanWrittenOff {
        loan_id: loan.id,
        write_off_id: record.id,
        total_write_off: record.total_written_off(),
        reason,
        timestamp: time.now(),
    });
    Ok(record)
}
