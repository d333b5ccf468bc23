use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;

/// error taxonomy for the servicing core. Every failure is recoverable by
/// the caller: rejected operations leave the aggregate unchanged, and
/// concurrency conflicts are retryable after a reload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("cannot {operation} from status {current}")]
    InvalidStateTransition {
        current: String,
        operation: &'static str,
    },

    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] Invariant),

    #[error("concurrency conflict on {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// structured invariant breaches, matched by the caller instead of a
/// type-per-condition exception hierarchy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Invariant {
    #[error("payment {submitted} exceeds total outstanding {outstanding}")]
    OverpaymentExceedsOutstanding {
        outstanding: Money,
        submitted: Money,
    },

    #[error("recovery of {attempted} would exceed write-off: {recovered} of {total} already recovered")]
    RecoveryExceedsWriteOff {
        total: Money,
        recovered: Money,
        attempted: Money,
    },

    #[error("disbursing {requested} would exceed approved principal: {disbursed} of {approved} already disbursed")]
    TrancheExceedsApprovedPrincipal {
        approved: Money,
        disbursed: Money,
        requested: Money,
    },

    #[error("invalid amount for {field}: {amount}")]
    InvalidAmount { field: &'static str, amount: Money },

    #[error("approval date {approval} precedes application date {application}")]
    ApprovalPrecedesApplication {
        application: NaiveDate,
        approval: NaiveDate,
    },

    #[error("promise not yet due: promised date is {promised_date}")]
    PromiseNotYetDue { promised_date: NaiveDate },
}

pub type Result<T> = std::result::Result<T, LoanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoanError::InvalidStateTransition {
            current: "Closed".to_string(),
            operation: "apply_payment",
        };
        assert_eq!(err.to_string(), "cannot apply_payment from status Closed");
    }

    #[test]
    fn test_invariant_converts() {
        let err: LoanError = Invariant::RecoveryExceedsWriteOff {
            total: Money::from_major(1000),
            recovered: Money::from_major(900),
            attempted: Money::from_major(200),
        }
        .into();
        assert!(matches!(
            err,
            LoanError::InvariantViolation(Invariant::RecoveryExceedsWriteOff { .. })
        ));
    }
}
