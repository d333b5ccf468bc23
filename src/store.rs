use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::collections::CollectionCase;
use crate::errors::{LoanError, Result};
use crate::loan::Loan;
use crate::types::LoanStatus;

/// persisted aggregates expose an id and an optimistic concurrency token
pub trait Versioned {
    fn id(&self) -> Uuid;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Versioned for Loan {
    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for CollectionCase {
    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for crate::application::LoanApplication {
    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// versioned aggregate store. Saves use compare-and-swap on the version
/// token: a stale write comes back as ConcurrencyConflict and the caller
/// reloads and retries.
#[derive(Debug, Default)]
pub struct InMemoryStore<T> {
    entity: &'static str,
    items: HashMap<Uuid, T>,
}

impl<T: Versioned + Clone> InMemoryStore<T> {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            items: HashMap::new(),
        }
    }

    pub fn load(&self, id: Uuid) -> Result<T> {
        self.items.get(&id).cloned().ok_or(LoanError::NotFound {
            entity: self.entity,
            id,
        })
    }

    /// persist an aggregate, returning its new version. Rejects the write
    /// when the stored version has moved past the one the caller loaded.
    pub fn save(&mut self, mut item: T) -> Result<u64> {
        let id = item.id();
        if let Some(stored) = self.items.get(&id) {
            if stored.version() != item.version() {
                return Err(LoanError::ConcurrencyConflict {
                    entity: self.entity,
                    id,
                    expected: item.version(),
                    actual: stored.version(),
                });
            }
        }
        let next = item.version() + 1;
        item.set_version(next);
        self.items.insert(id, item);
        Ok(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// load-mutate-save with bounded retries on version conflicts
pub fn update_with_retry<T, F>(
    store: &mut InMemoryStore<T>,
    id: Uuid,
    max_attempts: u32,
    mut operation: F,
) -> Result<T>
where
    T: Versioned + Clone,
    F: FnMut(&mut T) -> Result<()>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut item = store.load(id)?;
        operation(&mut item)?;
        match store.save(item.clone()) {
            Ok(version) => {
                item.set_version(version);
                return Ok(item);
            }
            Err(LoanError::ConcurrencyConflict { .. }) if attempt < max_attempts => {
                debug!(entity = %id, attempt, "version conflict, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// active loans with an installment past due before the cutoff; the
/// delinquency sweep feeds these into collections
pub fn find_overdue_loans(store: &InMemoryStore<Loan>, as_of: NaiveDate) -> Vec<Loan> {
    store
        .iter()
        .filter(|l| l.status == LoanStatus::Disbursed && l.is_delinquent(as_of))
        .cloned()
        .collect()
}

/// open collection work ordered by priority, most urgent first
pub fn open_cases_by_priority(store: &InMemoryStore<CollectionCase>) -> Vec<CollectionCase> {
    let mut cases: Vec<CollectionCase> = store
        .iter()
        .filter(|c| !c.status.is_terminal())
        .cloned()
        .collect();
    cases.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.days_past_due.cmp(&a.days_past_due)));
    cases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::events::EventStore;
    use chrono::{TimeZone, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};

    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap(),
        ))
    }

    fn case(dpd: u32, amount: i64) -> CollectionCase {
        let mut events = EventStore::new();
        CollectionCase::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Money::from_major(amount),
            dpd,
            &clock(),
            &mut events,
        )
        .unwrap()
    }

    #[test]
    fn test_save_bumps_version_and_load_round_trips() {
        let mut store = InMemoryStore::new("case");
        let c = case(39, 2_100);
        let id = c.id;

        let v1 = store.save(c).unwrap();
        assert_eq!(v1, 1);

        let loaded = store.load(id).unwrap();
        assert_eq!(loaded.version, 1);

        let v2 = store.save(loaded).unwrap();
        assert_eq!(v2, 2);
    }

    #[test]
    fn test_stale_write_is_rejected() {
        let mut store = InMemoryStore::new("case");
        let c = case(39, 2_100);
        let id = c.id;
        store.save(c).unwrap();

        // two readers load the same version
        let first = store.load(id).unwrap();
        let second = store.load(id).unwrap();

        store.save(first).unwrap();
        let err = store.save(second).unwrap_err();
        assert!(matches!(err, LoanError::ConcurrencyConflict { .. }));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let store: InMemoryStore<CollectionCase> = InMemoryStore::new("case");
        assert!(matches!(
            store.load(Uuid::new_v4()),
            Err(LoanError::NotFound { entity: "case", .. })
        ));
    }

    #[test]
    fn test_update_with_retry_applies_and_persists() {
        let mut store = InMemoryStore::new("case");
        let c = case(39, 2_100);
        let id = c.id;
        store.save(c).unwrap();

        let updated = update_with_retry(&mut store, id, 3, |case| {
            case.update_arrears(Money::from_major(3_000), 45)
        })
        .unwrap();

        assert_eq!(updated.amount_overdue, Money::from_major(3_000));
        assert_eq!(store.load(id).unwrap().days_past_due, 45);
    }

    #[test]
    fn test_open_cases_ordered_by_priority() {
        let mut store = InMemoryStore::new("case");
        store.save(case(10, 1_000)).unwrap(); // Low
        store.save(case(95, 1_000)).unwrap(); // Critical
        store.save(case(39, 2_100)).unwrap(); // Medium

        let mut settled = case(65, 1_000);
        let mut events = EventStore::new();
        settled
            .close("written off".to_string(), &clock(), &mut events)
            .unwrap();
        store.save(settled).unwrap();

        let queue = open_cases_by_priority(&store);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue[0].days_past_due, 95);
        assert_eq!(queue[2].days_past_due, 10);
    }
}
