use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{Invariant, LoanError, Result};
use crate::events::{Event, EventStore};
use crate::loan::Loan;
use crate::schedule::{generate, ScheduleTerms};
use crate::types::{Actor, LoanId, LoanStatus, RestructureId, RestructureType};

/// requested terms for a restructure. Fields left unset carry over from
/// the loan's current terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestructureRequest {
    pub restructure_type: RestructureType,
    pub new_term_months: Option<u32>,
    pub new_rate: Option<Rate>,
    /// principal forgiven as part of the workout
    pub waived_amount: Money,
    /// one-off fee charged onto the first new installment
    pub fee: Money,
    /// periods with no due date, for payment holidays
    pub grace_periods: u32,
    pub effective_date: NaiveDate,
    pub reason: String,
    pub approved_by: Actor,
}

/// audit record of one applied restructure: the terms before, the terms
/// after, and who signed off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRestructure {
    pub id: RestructureId,
    pub loan_id: LoanId,
    /// position in the loan's restructure chain, starting at 1
    pub restructure_number: u32,
    pub restructure_type: RestructureType,

    pub original_principal: Money,
    pub original_rate: Rate,
    pub original_term_months: u32,

    pub new_principal: Money,
    pub new_rate: Rate,
    pub new_term_months: u32,

    pub waived_amount: Money,
    pub fee: Money,
    pub grace_periods: u32,
    pub effective_date: NaiveDate,
    pub reason: String,
    pub approved_by: Actor,
}

impl RestructureRequest {
    /// each restructure kind must actually change the dimension it names
    fn validate(&self, loan: &Loan) -> Result<()> {
        if self.waived_amount.is_negative() {
            return Err(Invariant::InvalidAmount {
                field: "waived amount",
                amount: self.waived_amount,
            }
            .into());
        }
        if self.fee.is_negative() {
            return Err(Invariant::InvalidAmount {
                field: "restructure fee",
                amount: self.fee,
            }
            .into());
        }
        if self.waived_amount >= loan.outstanding_principal {
            return Err(Invariant::InvalidAmount {
                field: "waived amount",
                amount: self.waived_amount,
            }
            .into());
        }

        let misconfigured = match self.restructure_type {
            RestructureType::TermExtension => self
                .new_term_months
                .map_or(true, |t| t <= loan.term_months),
            RestructureType::RateReduction => self
                .new_rate
                .map_or(true, |r| r >= loan.interest_rate || r.is_negative()),
            RestructureType::PrincipalReduction => !self.waived_amount.is_positive(),
            RestructureType::PaymentHoliday => self.grace_periods == 0,
        };
        if misconfigured {
            return Err(LoanError::InvalidConfiguration {
                message: format!(
                    "{:?} restructure does not change the terms it targets",
                    self.restructure_type
                ),
            });
        }
        Ok(())
    }
}

/// replace a delinquent loan's active schedule with one generated from
/// renegotiated terms. The old lines stay in the ledger, superseded, for
/// audit. All-or-nothing: a rejected request leaves the loan untouched.
pub fn restructure(
    loan: &mut Loan,
    request: RestructureRequest,
    time: &SafeTimeProvider,
    events: &mut EventStore,
) -> Result<LoanRestructure> {
    if loan.status != LoanStatus::Disbursed {
        return Err(LoanError::InvalidStateTransition {
            current: format!("{:?}", loan.status),
            operation: "restructure",
        });
    }
    request.validate(loan)?;

    let new_principal = loan.outstanding_principal - request.waived_amount;
    let new_rate = request.new_rate.unwrap_or(loan.interest_rate);
    let new_term_months = request.new_term_months.unwrap_or(loan.term_months);

    // generate before superseding so a bad configuration cannot leave the
    // loan without an active schedule
    let planned = generate(&ScheduleTerms {
        principal: new_principal,
        annual_rate: new_rate,
        term_months: new_term_months,
        frequency: loan.frequency,
        method: loan.method,
        start_date: request.effective_date,
        grace_periods: request.grace_periods,
    })?;

    let record = LoanRestructure {
        id: Uuid::new_v4(),
        loan_id: loan.id,
        restructure_number: loan.restructure_count + 1,
        restructure_type: request.restructure_type,
        original_principal: loan.outstanding_principal,
        original_rate: loan.interest_rate,
        original_term_months: loan.term_months,
        new_principal,
        new_rate,
        new_term_months,
        waived_amount: request.waived_amount,
        fee: request.fee,
        grace_periods: request.grace_periods,
        effective_date: request.effective_date,
        reason: request.reason,
        approved_by: request.approved_by,
    };

    loan.ledger.supersede_active();
    loan.ledger.activate(&planned);
    if request.fee.is_positive() {
        loan.ledger.charge_fee(request.fee)?;
    }

    loan.interest_rate = new_rate;
    loan.term_months = new_term_months;
    loan.outstanding_principal = new_principal;
    loan.outstanding_interest = loan.ledger.outstanding_interest();
    loan.restructure_count += 1;

    info!(
        loan_id = %loan.id,
        number = record.restructure_number,
        kind = ?record.restructure_type,
        "loan restructured"
    );
    events.emit(Event::LoanRestructured {
        loan_id: loan.id,
        restructure_id: record.id,
        restructure_number: record.restructure_number,
        new_principal,
        new_rate,
        new_term_months,
        waived_amount: record.waived_amount,
        timestamp: time.now(),
    });
    Ok(record)
}
