use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{
    ApplicationId, CaseId, LoanId, PromiseId, RestructureId, TrancheId, UserId, WriteOffId,
};

/// domain facts emitted by the servicing core as plain data records.
/// An external observability/audit collaborator drains these; the core
/// never formats or transmits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // application workflow
    ApplicationSubmitted {
        application_id: ApplicationId,
        requested_amount: Money,
        timestamp: DateTime<Utc>,
    },
    ApplicationReviewStarted {
        application_id: ApplicationId,
        reviewer: UserId,
        timestamp: DateTime<Utc>,
    },
    ApplicationApproved {
        application_id: ApplicationId,
        approver: UserId,
        approved_amount: Money,
        approved_term_months: u32,
        timestamp: DateTime<Utc>,
    },
    ApplicationRejected {
        application_id: ApplicationId,
        reviewer: UserId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    ApplicationReturned {
        application_id: ApplicationId,
        reviewer: UserId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    ApplicationWithdrawn {
        application_id: ApplicationId,
        timestamp: DateTime<Utc>,
    },
    ApplicationExpired {
        application_id: ApplicationId,
        expiry_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // loan lifecycle
    LoanApproved {
        loan_id: LoanId,
        approval_date: NaiveDate,
        principal: Money,
    },
    TrancheDisbursed {
        loan_id: LoanId,
        tranche_id: TrancheId,
        net_amount: Money,
        disbursement_date: NaiveDate,
    },
    TrancheCancelled {
        loan_id: LoanId,
        tranche_id: TrancheId,
        reason: String,
    },
    LoanFullyDisbursed {
        loan_id: LoanId,
        total_disbursed: Money,
        installments: u32,
        timestamp: DateTime<Utc>,
    },
    PaymentApplied {
        loan_id: LoanId,
        amount: Money,
        to_fees: Money,
        to_interest: Money,
        to_principal: Money,
        unapplied: Money,
        payment_date: NaiveDate,
    },
    LoanClosed {
        loan_id: LoanId,
        closure_date: NaiveDate,
        total_paid: Money,
    },
    LoanWrittenOff {
        loan_id: LoanId,
        write_off_id: WriteOffId,
        total_write_off: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    LoanRestructured {
        loan_id: LoanId,
        restructure_id: RestructureId,
        restructure_number: u32,
        new_principal: Money,
        new_rate: Rate,
        new_term_months: u32,
        waived_amount: Money,
        timestamp: DateTime<Utc>,
    },

    // write-off recovery
    RecoveryRecorded {
        write_off_id: WriteOffId,
        loan_id: LoanId,
        amount: Money,
        total_recovered: Money,
        timestamp: DateTime<Utc>,
    },
    WriteOffFullyRecovered {
        write_off_id: WriteOffId,
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },

    // collections
    CaseOpened {
        case_id: CaseId,
        loan_id: LoanId,
        amount_overdue: Money,
        days_past_due: u32,
        timestamp: DateTime<Utc>,
    },
    CaseAssigned {
        case_id: CaseId,
        collector: UserId,
        follow_up_date: Option<NaiveDate>,
        timestamp: DateTime<Utc>,
    },
    CaseEscalated {
        case_id: CaseId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    CaseRecoveryRecorded {
        case_id: CaseId,
        amount: Money,
        remaining_overdue: Money,
        timestamp: DateTime<Utc>,
    },
    CaseSettled {
        case_id: CaseId,
        settlement_amount: Money,
        terms: String,
        timestamp: DateTime<Utc>,
    },
    CaseClosed {
        case_id: CaseId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    PromiseRecorded {
        case_id: CaseId,
        promise_id: PromiseId,
        promised_amount: Money,
        promised_date: NaiveDate,
    },
    PromiseKept {
        promise_id: PromiseId,
        amount_paid: Money,
        timestamp: DateTime<Utc>,
    },
    PromiseBroken {
        promise_id: PromiseId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    ActionRecorded {
        case_id: CaseId,
        loan_id: LoanId,
        performer: UserId,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_store_collects_and_drains() {
        let mut store = EventStore::new();
        store.emit(Event::LoanApproved {
            loan_id: Uuid::new_v4(),
            approval_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            principal: Money::from_major(12_000),
        });
        assert_eq!(store.events().len(), 1);

        let drained = store.take_events();
        assert_eq!(drained.len(), 1);
        assert!(store.events().is_empty());
    }

    #[test]
    fn test_events_serialize() {
        let event = Event::PaymentApplied {
            loan_id: Uuid::new_v4(),
            amount: Money::from_cents(106619),
            to_fees: Money::ZERO,
            to_interest: Money::from_major(120),
            to_principal: Money::from_cents(94619),
            unapplied: Money::ZERO,
            payment_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
