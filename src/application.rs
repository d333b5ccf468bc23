use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{Invariant, LoanError, Result};
use crate::events::{Event, EventStore};
use crate::types::{Actor, ApplicationId, ApplicationStatus, MemberId, ProductId};

/// days an approval stays valid before the application expires
const APPROVAL_VALIDITY_DAYS: i64 = 30;

/// a loan application moving from draft through review to a decision.
/// An approved application seeds a `Loan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub member_id: MemberId,
    pub product_id: ProductId,
    pub requested_amount: Money,
    pub requested_term_months: u32,
    pub purpose: Option<String>,
    pub application_date: NaiveDate,
    pub status: ApplicationStatus,

    // capacity snapshot taken at creation
    pub monthly_income: Option<Money>,
    pub monthly_expenses: Option<Money>,
    pub existing_debt: Option<Money>,
    /// percent of income absorbed by debt service, if income was declared
    pub debt_to_income_pct: Option<Decimal>,

    // credit assessment recorded during review
    pub credit_score: Option<u32>,
    pub risk_grade: Option<String>,

    // decision metadata
    pub reviewer: Option<Actor>,
    pub decision_at: Option<DateTime<Utc>>,
    pub decision_reason: Option<String>,
    pub approved_amount: Option<Money>,
    pub approved_term_months: Option<u32>,
    pub approval_expiry_date: Option<NaiveDate>,

    /// optimistic concurrency token, bumped by the store on save
    pub version: u64,
}

impl LoanApplication {
    /// create a draft application
    pub fn create(
        member_id: MemberId,
        product_id: ProductId,
        requested_amount: Money,
        requested_term_months: u32,
        purpose: Option<String>,
        monthly_income: Option<Money>,
        monthly_expenses: Option<Money>,
        existing_debt: Option<Money>,
        time: &SafeTimeProvider,
    ) -> Result<Self> {
        if !requested_amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "requested amount",
                amount: requested_amount,
            }
            .into());
        }
        if requested_term_months == 0 {
            return Err(LoanError::InvalidConfiguration {
                message: "requested term must be at least one month".to_string(),
            });
        }

        let debt_to_income_pct = monthly_income.and_then(|income| {
            if !income.is_positive() {
                return None;
            }
            let monthly_obligation = existing_debt.unwrap_or(Money::ZERO)
                + requested_amount / Decimal::from(requested_term_months);
            Some(
                (monthly_obligation.as_decimal() / income.as_decimal() * Decimal::from(100))
                    .round_dp(2),
            )
        });

        Ok(Self {
            id: Uuid::new_v4(),
            member_id,
            product_id,
            requested_amount,
            requested_term_months,
            purpose,
            application_date: time.now().date_naive(),
            status: ApplicationStatus::Draft,
            monthly_income,
            monthly_expenses,
            existing_debt,
            debt_to_income_pct,
            credit_score: None,
            risk_grade: None,
            reviewer: None,
            decision_at: None,
            decision_reason: None,
            approved_amount: None,
            approved_term_months: None,
            approval_expiry_date: None,
            version: 0,
        })
    }

    fn guard(&self, allowed: &[ApplicationStatus], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            })
        }
    }

    /// submit for review; valid from Draft and from Returned (resubmission)
    pub fn submit(&mut self, time: &SafeTimeProvider, events: &mut EventStore) -> Result<()> {
        self.guard(
            &[ApplicationStatus::Draft, ApplicationStatus::Returned],
            "submit",
        )?;
        self.status = ApplicationStatus::Submitted;
        events.emit(Event::ApplicationSubmitted {
            application_id: self.id,
            requested_amount: self.requested_amount,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// begin review, stamping the reviewer
    pub fn start_review(
        &mut self,
        reviewer: Actor,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(&[ApplicationStatus::Submitted], "start_review")?;
        self.status = ApplicationStatus::UnderReview;
        events.emit(Event::ApplicationReviewStarted {
            application_id: self.id,
            reviewer: reviewer.user_id,
            timestamp: time.now(),
        });
        self.reviewer = Some(reviewer);
        Ok(())
    }

    /// record the credit decision inputs gathered during review
    pub fn set_credit_assessment(&mut self, credit_score: u32, risk_grade: String) -> Result<()> {
        self.guard(&[ApplicationStatus::UnderReview], "set_credit_assessment")?;
        self.credit_score = Some(credit_score);
        self.risk_grade = Some(risk_grade);
        Ok(())
    }

    /// approve; amount and term may differ from what was requested
    pub fn approve(
        &mut self,
        approver: Actor,
        approved_amount: Money,
        approved_term_months: u32,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(&[ApplicationStatus::UnderReview], "approve")?;
        if !approved_amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "approved amount",
                amount: approved_amount,
            }
            .into());
        }
        if approved_term_months == 0 {
            return Err(LoanError::InvalidConfiguration {
                message: "approved term must be at least one month".to_string(),
            });
        }

        let now = time.now();
        self.status = ApplicationStatus::Approved;
        self.approved_amount = Some(approved_amount);
        self.approved_term_months = Some(approved_term_months);
        self.approval_expiry_date =
            Some(now.date_naive() + chrono::Duration::days(APPROVAL_VALIDITY_DAYS));
        self.decision_at = Some(now);

        info!(application_id = %self.id, %approved_amount, "application approved");
        events.emit(Event::ApplicationApproved {
            application_id: self.id,
            approver: approver.user_id,
            approved_amount,
            approved_term_months,
            timestamp: now,
        });
        self.reviewer = Some(approver);
        Ok(())
    }

    /// reject with a documented reason
    pub fn reject(
        &mut self,
        reviewer: Actor,
        reason: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(
            &[ApplicationStatus::Submitted, ApplicationStatus::UnderReview],
            "reject",
        )?;
        let now = time.now();
        self.status = ApplicationStatus::Rejected;
        self.decision_at = Some(now);
        self.decision_reason = Some(reason.clone());

        info!(application_id = %self.id, "application rejected");
        events.emit(Event::ApplicationRejected {
            application_id: self.id,
            reviewer: reviewer.user_id,
            reason,
            timestamp: now,
        });
        self.reviewer = Some(reviewer);
        Ok(())
    }

    /// send back to the applicant for corrections; they may resubmit
    pub fn return_to_applicant(
        &mut self,
        reviewer: Actor,
        reason: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(&[ApplicationStatus::UnderReview], "return_to_applicant")?;
        if reason.trim().is_empty() {
            return Err(LoanError::InvalidConfiguration {
                message: "return reason is required".to_string(),
            });
        }
        self.status = ApplicationStatus::Returned;
        self.decision_reason = Some(reason.clone());
        events.emit(Event::ApplicationReturned {
            application_id: self.id,
            reviewer: reviewer.user_id,
            reason,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// applicant withdraws; valid from any non-terminal state
    pub fn withdraw(&mut self, time: &SafeTimeProvider, events: &mut EventStore) -> Result<()> {
        if self.status.is_terminal() {
            return Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation: "withdraw",
            });
        }
        self.status = ApplicationStatus::Withdrawn;
        events.emit(Event::ApplicationWithdrawn {
            application_id: self.id,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// expire an approval whose validity window has lapsed
    pub fn mark_expired(&mut self, time: &SafeTimeProvider, events: &mut EventStore) -> Result<()> {
        self.guard(&[ApplicationStatus::Approved], "mark_expired")?;
        let today = time.now().date_naive();
        let expiry = self.approval_expiry_date.unwrap_or(today);
        if today <= expiry {
            return Err(LoanError::InvalidStateTransition {
                current: format!("{:?} (approval still valid)", self.status),
                operation: "mark_expired",
            });
        }
        self.status = ApplicationStatus::Expired;
        events.emit(Event::ApplicationExpired {
            application_id: self.id,
            expiry_date: expiry,
            timestamp: time.now(),
        });
        Ok(())
    }
}
