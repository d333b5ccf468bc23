//! end-to-end servicing flows: origination through payoff, and
//! delinquency through collections, restructure and write-off

use chrono::{NaiveDate, TimeZone, Utc};
use loan_servicing_rs::{
    find_overdue_loans, restructure, write_off, ActionOutcome, ActionType, Actor,
    AllocationMode, ApplicationStatus, CaseClassification, CasePriority, CaseStatus,
    CollectionCase, Event, EventStore, InMemoryStore, InterestMethod, Loan, LoanApplication,
    LoanStatus, Money, PromiseStatus, Rate, RepaymentFrequency, RestructureRequest,
    RestructureType, SafeTimeProvider, TimeSource, Uuid, WriteOffStatus,
};

fn clock(y: i32, m: u32, d: u32) -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap(),
    ))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn officer() -> Actor {
    Actor::new(Uuid::new_v4(), "loan officer")
}

/// originate a 12,000 / 12% / 12-month reducing-balance loan, fully
/// disbursed on the clock's current day
fn originate(time: &SafeTimeProvider, events: &mut EventStore) -> Loan {
    let mut app = LoanApplication::create(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Money::from_major(12_000),
        12,
        Some("working capital".to_string()),
        Some(Money::from_major(3_000)),
        Some(Money::from_major(1_200)),
        Some(Money::from_major(400)),
        time,
    )
    .unwrap();
    app.submit(time, events).unwrap();
    app.start_review(officer(), time, events).unwrap();
    app.set_credit_assessment(720, "B".to_string()).unwrap();
    app.approve(officer(), Money::from_major(12_000), 12, time, events)
        .unwrap();
    assert_eq!(app.status, ApplicationStatus::Approved);

    let mut loan = Loan::from_application(
        &app,
        Rate::from_percentage(12),
        RepaymentFrequency::Monthly,
        InterestMethod::ReducingBalance,
    )
    .unwrap();
    loan.approve(time.now().date_naive(), events).unwrap();

    // funding in two tranches
    let today = time.now().date_naive();
    let t1 = loan
        .schedule_tranche(today, Money::from_major(7_000), Money::ZERO)
        .unwrap();
    let t2 = loan
        .schedule_tranche(today, Money::from_major(5_000), Money::ZERO)
        .unwrap();
    loan.disburse_tranche(t1, Uuid::new_v4(), "TXN-001".to_string(), time, events)
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Approved);
    loan.disburse_tranche(t2, Uuid::new_v4(), "TXN-002".to_string(), time, events)
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Disbursed);
    loan
}

#[test]
fn origination_through_payoff_and_closure() {
    let time = clock(2024, 1, 15);
    let mut events = EventStore::new();
    let mut loan = originate(&time, &mut events);

    assert_eq!(loan.outstanding_principal, Money::from_major(12_000));
    assert_eq!(loan.ledger.lines().len(), 12);

    // three on-time monthly installments
    let emi = Money::from_cents(106_619);
    for month in 2..=4 {
        let alloc = loan
            .apply_payment(emi, date(2024, month, 15), AllocationMode::Lenient, &mut events)
            .unwrap();
        assert_eq!(alloc.unapplied, Money::ZERO);
    }
    assert!(!loan.is_delinquent(date(2024, 4, 20)));
    assert!(loan.outstanding_principal < Money::from_major(12_000));

    // settle the remainder in one strict payment
    let payoff = loan.total_outstanding();
    loan.apply_payment(payoff, date(2024, 5, 1), AllocationMode::Strict, &mut events)
        .unwrap();
    assert_eq!(loan.outstanding_principal, Money::ZERO);
    assert_eq!(loan.outstanding_interest, Money::ZERO);

    loan.close(date(2024, 5, 1), &mut events).unwrap();
    assert_eq!(loan.status, LoanStatus::Closed);
    assert_eq!(
        loan.total_paid,
        emi + emi + emi + payoff
    );
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, Event::LoanClosed { .. })));
}

#[test]
fn delinquency_collections_restructure_and_write_off() {
    let time = clock(2024, 1, 1);
    let mut events = EventStore::new();
    let mut loans = InMemoryStore::new("loan");
    let mut cases = InMemoryStore::new("case");

    let loan = originate(&time, &mut events);
    let loan_id = loan.id;
    loans.save(loan).unwrap();

    // no payments arrive; the April sweep finds three missed installments
    let sweep_date = date(2024, 4, 10);
    let overdue = find_overdue_loans(&loans, sweep_date);
    assert_eq!(overdue.len(), 1);

    let mut loan = loans.load(loan_id).unwrap();
    let arrears = loan.overdue_amount(sweep_date);
    let dpd = loan.days_past_due(sweep_date);
    assert_eq!(dpd, 69); // oldest miss was Feb 1
    assert!(arrears > Money::from_major(3_000));

    // open and work a collection case
    let sweep_clock = clock(2024, 4, 10);
    let mut case = CollectionCase::open(
        loan_id,
        loan.member_id,
        arrears,
        dpd,
        &sweep_clock,
        &mut events,
    )
    .unwrap();
    assert_eq!(case.priority, CasePriority::High);
    assert_eq!(case.classification, CaseClassification::Substandard);

    let collector = Actor::new(Uuid::new_v4(), "field collector");
    case.assign(collector.clone(), Some(date(2024, 4, 17)), &sweep_clock, &mut events)
        .unwrap();
    case.record_action(
        ActionType::PhoneCall,
        date(2024, 4, 11),
        collector.clone(),
        ActionOutcome::PromisedToPay,
        None,
        None,
        &sweep_clock,
        &mut events,
    )
    .unwrap();
    assert_eq!(case.status, CaseStatus::InProgress);

    // debtor promises 500 by Apr 20 but pays only 200
    let promise_id = case
        .record_promise(Money::from_major(500), date(2024, 4, 20), None, &sweep_clock, &mut events)
        .unwrap();
    let late_clock = clock(2024, 4, 25);
    case.promise_mut(promise_id)
        .unwrap()
        .record_payment(Money::from_major(200), &late_clock, &mut events)
        .unwrap();
    case.promise_mut(promise_id)
        .unwrap()
        .mark_broken("paid 200 of 500".to_string(), &late_clock, &mut events)
        .unwrap();
    assert_eq!(case.promises[0].status, PromiseStatus::PartiallyKept);

    // the 200 lands on the loan and the case arrears
    loan.apply_payment(Money::from_major(200), date(2024, 4, 25), AllocationMode::Lenient, &mut events)
        .unwrap();
    case.record_recovery(Money::from_major(200), &late_clock, &mut events)
        .unwrap();
    assert_eq!(case.amount_overdue, arrears - Money::from_major(200));

    // workout: extend the term and restart the schedule from May
    let record = restructure(
        &mut loan,
        RestructureRequest {
            restructure_type: RestructureType::TermExtension,
            new_term_months: Some(18),
            new_rate: None,
            waived_amount: Money::ZERO,
            fee: Money::ZERO,
            grace_periods: 0,
            effective_date: date(2024, 5, 1),
            reason: "income shock, revised capacity".to_string(),
            approved_by: officer(),
        },
        &late_clock,
        &mut events,
    )
    .unwrap();
    assert_eq!(record.restructure_number, 1);
    assert_eq!(loan.term_months, 18);
    // the old arrears are superseded; nothing is overdue under the new terms
    assert_eq!(loan.overdue_amount(date(2024, 5, 15)), Money::ZERO);

    case.update_arrears(Money::ZERO, 0).unwrap();
    assert_eq!(case.classification, CaseClassification::Current);
    case.close("loan restructured".to_string(), &late_clock, &mut events)
        .unwrap();
    cases.save(case).unwrap();
    loans.save(loan).unwrap();

    // the workout fails; nothing more is paid and the loan is written off
    let mut loan = loans.load(loan_id).unwrap();
    let writeoff_clock = clock(2024, 12, 1);
    let mut record = write_off(
        &mut loan,
        "borrower absconded".to_string(),
        Actor::new(Uuid::new_v4(), "credit committee"),
        &writeoff_clock,
        &mut events,
    )
    .unwrap();
    assert_eq!(loan.status, LoanStatus::WrittenOff);
    assert_eq!(loan.total_outstanding(), Money::ZERO);
    assert!(record.days_past_due > 90);

    // a later recovery trickles in against the write-off
    record
        .record_recovery(Money::from_major(500), &writeoff_clock, &mut events)
        .unwrap();
    assert_eq!(record.status, WriteOffStatus::Active);
    assert!(record.outstanding_recovery() > Money::ZERO);

    loans.save(loan).unwrap();
    assert_eq!(loans.load(loan_id).unwrap().version, 3);
}

#[test]
fn stale_loan_write_is_rejected_and_retryable() {
    let time = clock(2024, 1, 1);
    let mut events = EventStore::new();
    let mut loans = InMemoryStore::new("loan");

    let loan = originate(&time, &mut events);
    let loan_id = loan.id;
    loans.save(loan).unwrap();

    // two tellers load the same version and both take a payment
    let mut first = loans.load(loan_id).unwrap();
    let mut second = loans.load(loan_id).unwrap();
    first
        .apply_payment(Money::from_major(500), date(2024, 2, 1), AllocationMode::Lenient, &mut events)
        .unwrap();
    second
        .apply_payment(Money::from_major(300), date(2024, 2, 1), AllocationMode::Lenient, &mut events)
        .unwrap();

    loans.save(first).unwrap();
    assert!(loans.save(second).is_err());

    // the losing teller reloads and replays
    let mut retried = loans.load(loan_id).unwrap();
    retried
        .apply_payment(Money::from_major(300), date(2024, 2, 1), AllocationMode::Lenient, &mut events)
        .unwrap();
    loans.save(retried).unwrap();

    let final_loan = loans.load(loan_id).unwrap();
    assert_eq!(final_loan.total_paid, Money::from_major(800));
}
