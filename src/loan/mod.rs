pub mod ledger;
pub mod tranche;

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::application::LoanApplication;
use crate::decimal::{Money, Rate};
use crate::errors::{Invariant, LoanError, Result};
use crate::events::{Event, EventStore};
use crate::schedule::{generate, AllocationMode, ScheduleTerms};
use crate::types::{
    ApplicationId, ApplicationStatus, InterestMethod, LoanId, LoanStatus, MemberId,
    PaymentAllocation, ProductId, RepaymentFrequency, TrancheId, UserId,
};

pub use ledger::ScheduleLedger;
pub use tranche::{DisbursementTranche, TrancheSet};

/// the loan aggregate: owns its repayment ledger and disbursement
/// tranches, and is the single consistency boundary for all mutations
/// against them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub application_id: ApplicationId,
    pub member_id: MemberId,
    pub product_id: ProductId,

    pub principal: Money,
    pub interest_rate: Rate,
    pub term_months: u32,
    pub frequency: RepaymentFrequency,
    pub method: InterestMethod,

    pub status: LoanStatus,
    pub application_date: NaiveDate,
    pub approval_date: Option<NaiveDate>,
    pub disbursement_date: Option<NaiveDate>,
    pub closure_date: Option<NaiveDate>,

    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    pub total_paid: Money,
    pub restructure_count: u32,

    pub tranches: TrancheSet,
    pub ledger: ScheduleLedger,

    /// optimistic concurrency token, bumped by the store on save
    pub version: u64,
}

impl Loan {
    /// seed a loan from an approved application
    pub fn from_application(
        application: &LoanApplication,
        interest_rate: Rate,
        frequency: RepaymentFrequency,
        method: InterestMethod,
    ) -> Result<Self> {
        if application.status != ApplicationStatus::Approved {
            return Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", application.status),
                operation: "seed_loan",
            });
        }
        if interest_rate.is_negative() {
            return Err(LoanError::InvalidConfiguration {
                message: format!("interest rate must not be negative, got {interest_rate}"),
            });
        }

        // approval guarantees these are present
        let principal = application
            .approved_amount
            .unwrap_or(application.requested_amount);
        let term_months = application
            .approved_term_months
            .unwrap_or(application.requested_term_months);

        Ok(Self {
            id: Uuid::new_v4(),
            application_id: application.id,
            member_id: application.member_id,
            product_id: application.product_id,
            principal,
            interest_rate,
            term_months,
            frequency,
            method,
            status: LoanStatus::Pending,
            application_date: application.application_date,
            approval_date: None,
            disbursement_date: None,
            closure_date: None,
            outstanding_principal: Money::ZERO,
            outstanding_interest: Money::ZERO,
            total_paid: Money::ZERO,
            restructure_count: 0,
            tranches: TrancheSet::new(),
            ledger: ScheduleLedger::new(),
            version: 0,
        })
    }

    fn guard(&self, allowed: &[LoanStatus], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            })
        }
    }

    /// approve for funding
    pub fn approve(&mut self, approval_date: NaiveDate, events: &mut EventStore) -> Result<()> {
        self.guard(&[LoanStatus::Pending], "approve")?;
        if approval_date < self.application_date {
            return Err(Invariant::ApprovalPrecedesApplication {
                application: self.application_date,
                approval: approval_date,
            }
            .into());
        }
        self.status = LoanStatus::Approved;
        self.approval_date = Some(approval_date);

        info!(loan_id = %self.id, principal = %self.principal, "loan approved");
        events.emit(Event::LoanApproved {
            loan_id: self.id,
            approval_date,
            principal: self.principal,
        });
        Ok(())
    }

    /// schedule a disbursement tranche against the approved principal
    pub fn schedule_tranche(
        &mut self,
        scheduled_date: NaiveDate,
        gross_amount: Money,
        fees: Money,
    ) -> Result<TrancheId> {
        self.guard(&[LoanStatus::Approved], "schedule_tranche")?;
        self.tranches
            .schedule(scheduled_date, gross_amount, fees, self.principal)
    }

    /// pay out a tranche. The net amount joins the outstanding principal;
    /// once disbursed nets cover the approved principal the loan activates
    /// and the repayment schedule is generated.
    pub fn disburse_tranche(
        &mut self,
        tranche_id: TrancheId,
        by: UserId,
        reference: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Money> {
        self.guard(&[LoanStatus::Approved], "disburse_tranche")?;

        let today = time.now().date_naive();
        let net = self.tranches.disburse(tranche_id, by, reference, today)?;
        self.outstanding_principal += net;

        events.emit(Event::TrancheDisbursed {
            loan_id: self.id,
            tranche_id,
            net_amount: net,
            disbursement_date: today,
        });

        if self.tranches.is_fully_disbursed(self.principal) {
            self.activate_schedule(today, time.now(), events)?;
        }
        Ok(net)
    }

    /// cancel a scheduled tranche
    pub fn cancel_tranche(
        &mut self,
        tranche_id: TrancheId,
        reason: String,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(&[LoanStatus::Approved], "cancel_tranche")?;
        self.tranches.cancel(tranche_id, reason.clone())?;
        events.emit(Event::TrancheCancelled {
            loan_id: self.id,
            tranche_id,
            reason,
        });
        Ok(())
    }

    fn activate_schedule(
        &mut self,
        start_date: NaiveDate,
        now: chrono::DateTime<chrono::Utc>,
        events: &mut EventStore,
    ) -> Result<()> {
        let planned = generate(&ScheduleTerms {
            principal: self.principal,
            annual_rate: self.interest_rate,
            term_months: self.term_months,
            frequency: self.frequency,
            method: self.method,
            start_date,
            grace_periods: 0,
        })?;
        self.ledger.activate(&planned);

        self.status = LoanStatus::Disbursed;
        self.disbursement_date = Some(start_date);
        self.outstanding_interest = self.ledger.outstanding_interest();

        info!(loan_id = %self.id, installments = planned.len(), "loan fully disbursed");
        events.emit(Event::LoanFullyDisbursed {
            loan_id: self.id,
            total_disbursed: self.tranches.total_disbursed(),
            installments: planned.len() as u32,
            timestamp: now,
        });
        Ok(())
    }

    /// apply a repayment through the waterfall. All-or-nothing: a rejected
    /// allocation leaves both the ledger and the outstanding totals untouched.
    pub fn apply_payment(
        &mut self,
        amount: Money,
        payment_date: NaiveDate,
        mode: AllocationMode,
        events: &mut EventStore,
    ) -> Result<PaymentAllocation> {
        self.guard(&[LoanStatus::Disbursed], "apply_payment")?;

        let allocation = self.ledger.receive_payment(amount, payment_date, mode)?;

        self.outstanding_principal = self
            .outstanding_principal
            .saturating_sub(allocation.to_principal);
        self.outstanding_interest = self
            .outstanding_interest
            .saturating_sub(allocation.to_interest);
        self.total_paid += allocation.total_applied();

        events.emit(Event::PaymentApplied {
            loan_id: self.id,
            amount,
            to_fees: allocation.to_fees,
            to_interest: allocation.to_interest,
            to_principal: allocation.to_principal,
            unapplied: allocation.unapplied,
            payment_date,
        });
        Ok(allocation)
    }

    /// close a fully repaid loan
    pub fn close(&mut self, closure_date: NaiveDate, events: &mut EventStore) -> Result<()> {
        self.guard(&[LoanStatus::Disbursed], "close")?;
        if !self.outstanding_principal.is_zero() || !self.outstanding_interest.is_zero() {
            return Err(LoanError::InvalidStateTransition {
                current: "Disbursed (outstanding balance remains)".to_string(),
                operation: "close",
            });
        }
        self.status = LoanStatus::Closed;
        self.closure_date = Some(closure_date);

        info!(loan_id = %self.id, total_paid = %self.total_paid, "loan closed");
        events.emit(Event::LoanClosed {
            loan_id: self.id,
            closure_date,
            total_paid: self.total_paid,
        });
        Ok(())
    }

    /// total actively owed across the ledger
    pub fn total_outstanding(&self) -> Money {
        self.ledger.total_outstanding()
    }

    pub fn overdue_amount(&self, as_of: NaiveDate) -> Money {
        self.ledger.overdue_amount(as_of)
    }

    pub fn days_past_due(&self, as_of: NaiveDate) -> u32 {
        self.ledger.days_past_due(as_of)
    }

    /// delinquent when any active line is past due
    pub fn is_delinquent(&self, as_of: NaiveDate) -> bool {
        self.days_past_due(as_of) > 0
    }
}
