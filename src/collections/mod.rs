pub mod action;
pub mod promise;

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{Invariant, LoanError, Result};
use crate::events::{Event, EventStore};
use crate::types::{
    ActionOutcome, ActionType, Actor, CaseClassification, CaseId, CasePriority, CaseStatus,
    LoanId, MemberId, PromiseId,
};

pub use action::CollectionAction;
pub use promise::PromiseToPay;

/// arrears depth and exposure drive the work-queue priority
fn derive_priority(days_past_due: u32, amount_overdue: Money) -> CasePriority {
    if days_past_due > 90 || amount_overdue > Money::from_major(100_000) {
        CasePriority::Critical
    } else if days_past_due > 60 || amount_overdue > Money::from_major(50_000) {
        CasePriority::High
    } else if days_past_due > 30 || amount_overdue > Money::from_major(10_000) {
        CasePriority::Medium
    } else {
        CasePriority::Low
    }
}

/// regulatory classification follows days past due alone
fn derive_classification(days_past_due: u32) -> CaseClassification {
    match days_past_due {
        0 => CaseClassification::Current,
        1..=30 => CaseClassification::Watch,
        31..=90 => CaseClassification::Substandard,
        91..=180 => CaseClassification::Doubtful,
        _ => CaseClassification::Loss,
    }
}

/// a delinquency work item over one loan: arrears snapshot, assignment,
/// the contact/action log and any promises to pay. Settles automatically
/// when recoveries clear the overdue amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionCase {
    pub id: CaseId,
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub classification: CaseClassification,

    pub amount_overdue: Money,
    pub days_past_due: u32,
    pub total_recovered: Money,

    pub assigned_to: Option<Actor>,
    pub follow_up_date: Option<NaiveDate>,
    pub opened_date: NaiveDate,
    pub resolved_date: Option<NaiveDate>,
    pub last_contact_date: Option<NaiveDate>,
    pub escalated_to_legal: bool,
    pub settlement_terms: Option<String>,

    pub actions: Vec<CollectionAction>,
    pub promises: Vec<PromiseToPay>,

    /// optimistic concurrency token, bumped by the store on save
    pub version: u64,
}

impl CollectionCase {
    pub fn open(
        loan_id: LoanId,
        member_id: MemberId,
        amount_overdue: Money,
        days_past_due: u32,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Self> {
        if !amount_overdue.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "amount overdue",
                amount: amount_overdue,
            }
            .into());
        }

        let case = Self {
            id: Uuid::new_v4(),
            loan_id,
            member_id,
            status: CaseStatus::Open,
            priority: derive_priority(days_past_due, amount_overdue),
            classification: derive_classification(days_past_due),
            amount_overdue,
            days_past_due,
            total_recovered: Money::ZERO,
            assigned_to: None,
            follow_up_date: None,
            opened_date: time.now().date_naive(),
            resolved_date: None,
            last_contact_date: None,
            escalated_to_legal: false,
            settlement_terms: None,
            actions: Vec::new(),
            promises: Vec::new(),
            version: 0,
        };

        info!(case_id = %case.id, loan_id = %loan_id, priority = ?case.priority, "collection case opened");
        events.emit(Event::CaseOpened {
            case_id: case.id,
            loan_id,
            amount_overdue,
            days_past_due,
            timestamp: time.now(),
        });
        Ok(case)
    }

    fn guard(&self, allowed: &[CaseStatus], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            })
        }
    }

    fn guard_workable(&self, operation: &'static str) -> Result<()> {
        if self.status.is_terminal() {
            Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            })
        } else {
            Ok(())
        }
    }

    /// hand the case to a collector; reassignment is allowed until work
    /// has started
    pub fn assign(
        &mut self,
        collector: Actor,
        follow_up_date: Option<NaiveDate>,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(&[CaseStatus::Open, CaseStatus::Assigned], "assign_case")?;
        self.status = CaseStatus::Assigned;
        self.follow_up_date = follow_up_date;
        events.emit(Event::CaseAssigned {
            case_id: self.id,
            collector: collector.user_id,
            follow_up_date,
            timestamp: time.now(),
        });
        self.assigned_to = Some(collector);
        Ok(())
    }

    /// log a collection activity. The first action on an assigned case
    /// moves it to InProgress.
    #[allow(clippy::too_many_arguments)]
    pub fn record_action(
        &mut self,
        action_type: ActionType,
        action_date: NaiveDate,
        performed_by: Actor,
        outcome: ActionOutcome,
        notes: Option<String>,
        next_action_date: Option<NaiveDate>,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard_workable("record_action")?;

        let action = CollectionAction::new(
            self.id,
            action_type,
            action_date,
            performed_by.clone(),
            outcome,
            notes,
            next_action_date,
        );
        if action.made_contact() {
            self.last_contact_date = Some(action_date);
        }
        if self.status == CaseStatus::Assigned {
            self.status = CaseStatus::InProgress;
        }
        self.actions.push(action);

        events.emit(Event::ActionRecorded {
            case_id: self.id,
            loan_id: self.loan_id,
            performer: performed_by.user_id,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// capture a promise to pay made by the debtor
    pub fn record_promise(
        &mut self,
        promised_amount: Money,
        promised_date: NaiveDate,
        notes: Option<String>,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<PromiseId> {
        self.guard_workable("record_promise")?;

        let promise = PromiseToPay::new(
            self.id,
            promised_amount,
            promised_date,
            time.now().date_naive(),
            notes,
        )?;
        let id = promise.id;
        if self.status == CaseStatus::Assigned {
            self.status = CaseStatus::InProgress;
        }
        events.emit(Event::PromiseRecorded {
            case_id: self.id,
            promise_id: id,
            promised_amount,
            promised_date,
        });
        self.promises.push(promise);
        Ok(id)
    }

    pub fn promise_mut(&mut self, id: PromiseId) -> Result<&mut PromiseToPay> {
        self.promises
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(LoanError::NotFound {
                entity: "promise",
                id,
            })
    }

    /// post a recovery against the arrears. Clearing the overdue amount
    /// settles the case.
    pub fn record_recovery(
        &mut self,
        amount: Money,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(
            &[CaseStatus::Assigned, CaseStatus::InProgress],
            "record_case_recovery",
        )?;
        if !amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "recovery amount",
                amount,
            }
            .into());
        }

        self.amount_overdue = self.amount_overdue.saturating_sub(amount);
        self.total_recovered += amount;
        events.emit(Event::CaseRecoveryRecorded {
            case_id: self.id,
            amount,
            remaining_overdue: self.amount_overdue,
            timestamp: time.now(),
        });

        if self.amount_overdue.is_zero() {
            self.resolve(
                self.total_recovered,
                "arrears recovered in full".to_string(),
                time,
                events,
            );
        }
        Ok(())
    }

    /// hand the case to the legal process; it stays workable but jumps to
    /// the top of the queue
    pub fn escalate_to_legal(
        &mut self,
        reason: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard_workable("escalate_to_legal")?;
        self.escalated_to_legal = true;
        self.priority = CasePriority::Critical;

        warn!(case_id = %self.id, loan_id = %self.loan_id, "case escalated to legal");
        events.emit(Event::CaseEscalated {
            case_id: self.id,
            reason,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// settle on negotiated terms, e.g. a discounted lump sum
    pub fn settle(
        &mut self,
        settlement_amount: Money,
        terms: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(&[CaseStatus::Assigned, CaseStatus::InProgress], "settle_case")?;
        if !settlement_amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "settlement amount",
                amount: settlement_amount,
            }
            .into());
        }
        self.resolve(settlement_amount, terms, time, events);
        Ok(())
    }

    fn resolve(
        &mut self,
        settlement_amount: Money,
        terms: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) {
        self.status = CaseStatus::Settled;
        self.resolved_date = Some(time.now().date_naive());
        self.settlement_terms = Some(terms.clone());

        info!(case_id = %self.id, amount = %settlement_amount, "collection case settled");
        events.emit(Event::CaseSettled {
            case_id: self.id,
            settlement_amount,
            terms,
            timestamp: time.now(),
        });
    }

    /// close without settlement, e.g. when the loan is written off
    pub fn close(
        &mut self,
        reason: String,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard_workable("close_case")?;
        self.status = CaseStatus::Closed;
        self.resolved_date = Some(time.now().date_naive());
        events.emit(Event::CaseClosed {
            case_id: self.id,
            reason,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// refresh the arrears snapshot from the loan ledger and re-derive
    /// priority and classification. Legal escalation pins the priority.
    pub fn update_arrears(&mut self, amount_overdue: Money, days_past_due: u32) -> Result<()> {
        self.guard_workable("update_arrears")?;
        if amount_overdue.is_negative() {
            return Err(Invariant::InvalidAmount {
                field: "amount overdue",
                amount: amount_overdue,
            }
            .into());
        }
        self.amount_overdue = amount_overdue;
        self.days_past_due = days_past_due;
        self.classification = derive_classification(days_past_due);
        if !self.escalated_to_legal {
            self.priority = derive_priority(days_past_due, amount_overdue);
        }
        Ok(())
    }

    /// promises past their date with money still owed on them
    pub fn overdue_promises(&self, as_of: NaiveDate) -> impl Iterator<Item = &PromiseToPay> {
        self.promises.iter().filter(move |p| {
            p.status == crate::types::PromiseStatus::Active && p.promised_date < as_of
        })
    }
}
