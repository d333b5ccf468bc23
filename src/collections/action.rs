use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ActionOutcome, ActionType, Actor, CaseId};

/// one logged collection activity. Append-only: actions are recorded
/// exactly as performed and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionAction {
    pub id: Uuid,
    pub case_id: CaseId,
    pub action_type: ActionType,
    pub action_date: NaiveDate,
    pub performed_by: Actor,
    pub outcome: ActionOutcome,
    pub notes: Option<String>,
    pub next_action_date: Option<NaiveDate>,
}

impl CollectionAction {
    pub fn new(
        case_id: CaseId,
        action_type: ActionType,
        action_date: NaiveDate,
        performed_by: Actor,
        outcome: ActionOutcome,
        notes: Option<String>,
        next_action_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            action_type,
            action_date,
            performed_by,
            outcome,
            notes,
            next_action_date,
        }
    }

    /// true when the debtor was actually reached
    pub fn made_contact(&self) -> bool {
        matches!(
            self.outcome,
            ActionOutcome::Contacted
                | ActionOutcome::PromisedToPay
                | ActionOutcome::PaymentReceived
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_outcomes() {
        let actor = Actor::new(Uuid::new_v4(), "collector");
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let reached = CollectionAction::new(
            Uuid::new_v4(),
            ActionType::PhoneCall,
            date,
            actor.clone(),
            ActionOutcome::PromisedToPay,
            None,
            None,
        );
        let missed = CollectionAction::new(
            Uuid::new_v4(),
            ActionType::FieldVisit,
            date,
            actor,
            ActionOutcome::NoAnswer,
            Some("left a notice".to_string()),
            Some(NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()),
        );
        assert!(reached.made_contact());
        assert!(!missed.made_contact());
    }
}
