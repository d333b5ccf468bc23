use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{Invariant, LoanError, Result};
use crate::types::{TrancheId, TrancheStatus, UserId};

/// one scheduled partial disbursement of an approved loan's principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementTranche {
    pub id: TrancheId,
    pub sequence: u32,
    pub scheduled_date: NaiveDate,
    pub gross_amount: Money,
    /// fees deducted before payout
    pub fees: Money,
    pub net_amount: Money,
    pub status: TrancheStatus,
    pub disbursed_date: Option<NaiveDate>,
    pub disbursed_by: Option<UserId>,
    pub reference: Option<String>,
    pub cancel_reason: Option<String>,
}

impl DisbursementTranche {
    fn new(sequence: u32, scheduled_date: NaiveDate, gross_amount: Money, fees: Money) -> Result<Self> {
        if !gross_amount.is_positive() {
            return Err(Invariant::InvalidAmount {
                field: "tranche gross amount",
                amount: gross_amount,
            }
            .into());
        }
        if fees.is_negative() || fees >= gross_amount {
            return Err(Invariant::InvalidAmount {
                field: "tranche fees",
                amount: fees,
            }
            .into());
        }
        Ok(Self {
            id: Uuid::new_v4(),
            sequence,
            scheduled_date,
            gross_amount,
            fees,
            net_amount: gross_amount - fees,
            status: TrancheStatus::Scheduled,
            disbursed_date: None,
            disbursed_by: None,
            reference: None,
            cancel_reason: None,
        })
    }

    fn mark_disbursed(&mut self, by: UserId, reference: String, date: NaiveDate) -> Result<()> {
        if self.status != TrancheStatus::Scheduled {
            return Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation: "disburse_tranche",
            });
        }
        self.status = TrancheStatus::Disbursed;
        self.disbursed_by = Some(by);
        self.reference = Some(reference);
        self.disbursed_date = Some(date);
        Ok(())
    }

    fn mark_cancelled(&mut self, reason: String) -> Result<()> {
        if self.status != TrancheStatus::Scheduled {
            return Err(LoanError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation: "cancel_tranche",
            });
        }
        self.status = TrancheStatus::Cancelled;
        self.cancel_reason = Some(reason);
        Ok(())
    }
}

/// per-loan tranche set. Guards the aggregate invariant that committed
/// net amounts never exceed the approved principal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrancheSet {
    tranches: Vec<DisbursementTranche>,
}

impl TrancheSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tranches(&self) -> &[DisbursementTranche] {
        &self.tranches
    }

    pub fn get(&self, id: TrancheId) -> Option<&DisbursementTranche> {
        self.tranches.iter().find(|t| t.id == id)
    }

    /// net amount already paid out
    pub fn total_disbursed(&self) -> Money {
        self.tranches
            .iter()
            .filter(|t| t.status == TrancheStatus::Disbursed)
            .map(|t| t.net_amount)
            .sum()
    }

    /// net amount still committed: scheduled plus disbursed
    pub fn total_committed(&self) -> Money {
        self.tranches
            .iter()
            .filter(|t| t.status != TrancheStatus::Cancelled)
            .map(|t| t.net_amount)
            .sum()
    }

    pub fn schedule(
        &mut self,
        scheduled_date: NaiveDate,
        gross_amount: Money,
        fees: Money,
        approved_principal: Money,
    ) -> Result<TrancheId> {
        let sequence = self.tranches.len() as u32 + 1;
        let tranche = DisbursementTranche::new(sequence, scheduled_date, gross_amount, fees)?;

        let committed = self.total_committed() + tranche.net_amount;
        if committed > approved_principal {
            return Err(Invariant::TrancheExceedsApprovedPrincipal {
                approved: approved_principal,
                disbursed: self.total_committed(),
                requested: tranche.net_amount,
            }
            .into());
        }

        let id = tranche.id;
        self.tranches.push(tranche);
        Ok(id)
    }

    /// pay out a scheduled tranche, returning its net amount
    pub fn disburse(
        &mut self,
        id: TrancheId,
        by: UserId,
        reference: String,
        date: NaiveDate,
    ) -> Result<Money> {
        let tranche = self
            .tranches
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(LoanError::NotFound {
                entity: "tranche",
                id,
            })?;
        tranche.mark_disbursed(by, reference, date)?;
        Ok(tranche.net_amount)
    }

    /// cancel a scheduled tranche, releasing its commitment
    pub fn cancel(&mut self, id: TrancheId, reason: String) -> Result<()> {
        let tranche = self
            .tranches
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(LoanError::NotFound {
                entity: "tranche",
                id,
            })?;
        tranche.mark_cancelled(reason)
    }

    /// true once disbursed nets cover the approved principal
    pub fn is_fully_disbursed(&self, approved_principal: Money) -> bool {
        self.total_disbursed() >= approved_principal
    }
}
