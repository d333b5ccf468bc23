use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

/// unique identifier for a loan
pub type LoanId = Uuid;
/// unique identifier for a loan application
pub type ApplicationId = Uuid;
/// unique identifier for a disbursement tranche
pub type TrancheId = Uuid;
/// unique identifier for an installment line
pub type InstallmentId = Uuid;
/// unique identifier for a restructure record
pub type RestructureId = Uuid;
/// unique identifier for a write-off record
pub type WriteOffId = Uuid;
/// unique identifier for a collection case
pub type CaseId = Uuid;
/// unique identifier for a promise to pay
pub type PromiseId = Uuid;
/// member / borrower reference
pub type MemberId = Uuid;
/// loan product reference
pub type ProductId = Uuid;
/// acting user reference
pub type UserId = Uuid;

/// loan application status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Returned,
    Withdrawn,
    Expired,
}

impl ApplicationStatus {
    /// terminal states accept no further workflow transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
                | ApplicationStatus::Expired
        )
    }
}

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// created from an approved application, not yet approved for funding
    Pending,
    /// approved, awaiting disbursement
    Approved,
    /// fully funded, repayment schedule active
    Disbursed,
    /// fully repaid
    Closed,
    /// uncollectible balance moved to a write-off record
    WrittenOff,
}

impl LoanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Closed | LoanStatus::WrittenOff)
    }
}

/// disbursement tranche status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrancheStatus {
    Scheduled,
    Disbursed,
    Cancelled,
}

/// interest method for schedule generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestMethod {
    /// interest on original principal each period, principal split evenly
    Flat,
    /// amortizing: equal installments, interest on remaining balance
    ReducingBalance,
}

/// repayment frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepaymentFrequency {
    Weekly,
    Monthly,
    Quarterly,
}

impl RepaymentFrequency {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            RepaymentFrequency::Weekly => 52,
            RepaymentFrequency::Monthly => 12,
            RepaymentFrequency::Quarterly => 4,
        }
    }

    /// number of installments for a term expressed in months
    pub fn installments_for_term(&self, term_months: u32) -> u32 {
        let n = match self {
            RepaymentFrequency::Weekly => term_months * 52 / 12,
            RepaymentFrequency::Monthly => term_months,
            RepaymentFrequency::Quarterly => term_months / 3,
        };
        n.max(1)
    }
}

/// restructure type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestructureType {
    TermExtension,
    RateReduction,
    PrincipalReduction,
    PaymentHoliday,
}

/// write-off record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOffStatus {
    /// balance written off, recoveries still possible
    Active,
    /// recovered amount reached the written-off total (informational only)
    FullyRecovered,
}

/// collection case status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Open,
    Assigned,
    InProgress,
    Settled,
    Closed,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Settled | CaseStatus::Closed)
    }
}

/// collection case priority, derived from arrears depth and amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Critical,
}

/// regulatory loan classification, derived from days past due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseClassification {
    Current,
    Watch,
    Substandard,
    Doubtful,
    Loss,
}

/// promise-to-pay status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromiseStatus {
    Active,
    Kept,
    PartiallyKept,
    Broken,
}

/// collection action type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    PhoneCall,
    FieldVisit,
    Letter,
    LegalNotice,
}

/// collection action outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Contacted,
    NoAnswer,
    Unreachable,
    PromisedToPay,
    PaymentReceived,
    Refused,
}

/// acting user stamped onto approver/collector/performer fields;
/// identity resolution happens outside the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub display_name: String,
}

impl Actor {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

/// how a payment was split across what is owed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PaymentAllocation {
    pub to_fees: Money,
    pub to_interest: Money,
    pub to_principal: Money,
    pub unapplied: Money,
}

impl PaymentAllocation {
    pub fn total_applied(&self) -> Money {
        self.to_fees + self.to_interest + self.to_principal
    }

    /// applied plus unapplied must reconstruct the submitted amount
    pub fn total_submitted(&self) -> Money {
        self.total_applied() + self.unapplied
    }
}
