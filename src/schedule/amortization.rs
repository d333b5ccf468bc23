use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::{InterestMethod, RepaymentFrequency};

/// one planned installment produced by schedule generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedInstallment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub principal: Money,
    pub interest: Money,
}

impl PlannedInstallment {
    pub fn installment_amount(&self) -> Money {
        self.principal + self.interest
    }
}

/// inputs for schedule generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTerms {
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_months: u32,
    pub frequency: RepaymentFrequency,
    pub method: InterestMethod,
    /// date the schedule starts running; first installment falls one period later
    pub start_date: NaiveDate,
    /// periods to skip before the first due date (payment holiday)
    pub grace_periods: u32,
}

impl ScheduleTerms {
    fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LoanError::InvalidConfiguration {
                message: format!("principal must be positive, got {}", self.principal),
            });
        }
        if self.annual_rate.is_negative() {
            return Err(LoanError::InvalidConfiguration {
                message: format!("interest rate must not be negative, got {}", self.annual_rate),
            });
        }
        if self.term_months == 0 {
            return Err(LoanError::InvalidConfiguration {
                message: "term must be at least one month".to_string(),
            });
        }
        Ok(())
    }
}

/// generate an installment plan covering the entire principal.
/// Each line is rounded to cents; the final line absorbs the rounding
/// remainder so that principal components sum to the original exactly.
pub fn generate(terms: &ScheduleTerms) -> Result<Vec<PlannedInstallment>> {
    terms.validate()?;

    let n = terms.frequency.installments_for_term(terms.term_months);
    let periodic_rate = terms
        .annual_rate
        .periodic(terms.frequency.periods_per_year())
        .as_decimal();

    let lines = match terms.method {
        InterestMethod::ReducingBalance => reducing_balance(terms, n, periodic_rate),
        InterestMethod::Flat => flat(terms, n, periodic_rate),
    };

    debug_assert_eq!(
        lines.iter().map(|l| l.principal).sum::<Money>(),
        terms.principal.round_cents()
    );

    Ok(lines)
}

/// equal installments, interest on the remaining balance:
/// installment = P * r / (1 - (1 + r)^-n)
fn reducing_balance(terms: &ScheduleTerms, n: u32, rate: Decimal) -> Vec<PlannedInstallment> {
    let principal = terms.principal.round_cents();
    let installment = periodic_installment(principal, rate, n);

    let mut lines = Vec::with_capacity(n as usize);
    let mut balance = principal;

    for i in 1..=n {
        let interest = (balance * rate).round_cents();
        let principal_portion = if i == n {
            // final line absorbs the rounding remainder
            balance
        } else {
            (installment - interest).round_cents().min(balance)
        };

        lines.push(PlannedInstallment {
            number: i,
            due_date: due_date_for(terms, i),
            principal: principal_portion,
            interest,
        });

        balance -= principal_portion;
    }

    lines
}

/// flat method: principal split evenly, interest on the original
/// principal each period
fn flat(terms: &ScheduleTerms, n: u32, rate: Decimal) -> Vec<PlannedInstallment> {
    let principal = terms.principal.round_cents();
    let principal_per = (principal / Decimal::from(n)).round_cents();
    let interest_per = (principal * rate).round_cents();

    let mut lines = Vec::with_capacity(n as usize);
    let mut allocated = Money::ZERO;

    for i in 1..=n {
        let principal_portion = if i == n {
            principal - allocated
        } else {
            principal_per
        };
        allocated += principal_portion;

        lines.push(PlannedInstallment {
            number: i,
            due_date: due_date_for(terms, i),
            principal: principal_portion,
            interest: interest_per,
        });
    }

    lines
}

/// periodic installment amount for the amortizing formula
fn periodic_installment(principal: Money, rate: Decimal, n: u32) -> Money {
    if rate.is_zero() {
        return (principal / Decimal::from(n)).round_cents();
    }

    // (1 + r)^n by repeated multiplication, exact in Decimal
    let mut compound = Decimal::ONE;
    let base = Decimal::ONE + rate;
    for _ in 0..n {
        compound *= base;
    }

    let numerator = principal.as_decimal() * rate * compound;
    let denominator = compound - Decimal::ONE;
    Money::from_decimal(numerator / denominator).round_cents()
}

fn due_date_for(terms: &ScheduleTerms, number: u32) -> NaiveDate {
    let offset = number + terms.grace_periods;
    match terms.frequency {
        RepaymentFrequency::Weekly => terms.start_date + Duration::weeks(offset as i64),
        RepaymentFrequency::Monthly => add_months(terms.start_date, offset),
        RepaymentFrequency::Quarterly => add_months(terms.start_date, offset * 3),
    }
}

/// add calendar months, clamping the day to the end of the target month
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => unreachable!("month out of range"),
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
