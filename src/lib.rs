pub mod application;
pub mod collections;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod loan;
pub mod restructure;
pub mod schedule;
pub mod store;
pub mod types;
pub mod writeoff;

// re-export key types
pub use decimal::{Money, Rate};
pub use errors::{Invariant, LoanError, Result};
pub use events::{Event, EventStore};
pub use application::LoanApplication;
pub use loan::{DisbursementTranche, Loan, ScheduleLedger, TrancheSet};
pub use restructure::{restructure, LoanRestructure, RestructureRequest};
pub use schedule::{
    generate, AllocationMode, Installment, PlannedInstallment, ScheduleTerms,
};
pub use writeoff::{write_off, LoanWriteOff};
pub use collections::{CollectionAction, CollectionCase, PromiseToPay};
pub use store::{
    find_overdue_loans, open_cases_by_priority, update_with_retry, InMemoryStore, Versioned,
};
pub use types::{
    ActionOutcome, ActionType, Actor, ApplicationStatus, CaseClassification, CasePriority,
    CaseStatus, InterestMethod, LoanStatus, PaymentAllocation, PromiseStatus,
    RepaymentFrequency, RestructureType, TrancheStatus, WriteOffStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
