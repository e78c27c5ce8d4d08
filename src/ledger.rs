// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Transaction ledger.
//!
//! The [`Ledger`] stores every borrow/return record. Reads are available
//! directly on the ledger; writes are only reachable through an
//! [`ItemTransaction`], which holds the item's lock for its whole lifetime:
//!
//! ```
//! use std::sync::Arc;
//! use lending_ledger_rs::{ItemId, Ledger, UserId};
//!
//! let ledger = Ledger::new(Arc::new(mockable::DefaultClock));
//! let record = ledger.with_item(ItemId(1), |txn| {
//!     assert_eq!(txn.count_active_borrows(), 0);
//!     txn.create_borrow(UserId(7))
//! });
//! assert_eq!(ledger.count_active_borrows(ItemId(1)), 1);
//! assert!(ledger.get(record.id).unwrap().is_active());
//! ```
//!
//! # Thread Safety
//!
//! Records and indexes live in [`DashMap`]s. Check-then-write sequences for one
//! item are serialized by a per-item [`Mutex`], while different items proceed in
//! parallel. The item lock is always taken before any map access, and no map
//! reference is held while waiting on it.

use crate::LendingError;
use crate::base::{ItemId, RecordId, UserId};
use crate::record::{LendingStatus, TransactionRecord};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mockable::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// Clock shared by the ledger and the sweeper.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Record store with per-item atomic sections.
///
/// # Invariants
///
/// - At most one `Borrowed` record exists per (user, item) pair.
/// - Records are never deleted; each transitions out of `Borrowed` at most once.
/// - `borrowed_at <= returned_at` whenever `returned_at` is set.
pub struct Ledger {
    records: DashMap<RecordId, TransactionRecord>,
    /// Record ids per item, appended under the item lock.
    by_item: DashMap<ItemId, Vec<RecordId>>,
    /// Record ids per user.
    by_user: DashMap<UserId, Vec<RecordId>>,
    item_locks: DashMap<ItemId, Arc<Mutex<()>>>,
    next_record_id: AtomicU64,
    clock: SharedClock,
}

impl Ledger {
    /// Creates an empty ledger stamping records with `clock`.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            records: DashMap::new(),
            by_item: DashMap::new(),
            by_user: DashMap::new(),
            item_locks: DashMap::new(),
            next_record_id: AtomicU64::new(1),
            clock,
        }
    }

    /// Runs `f` while holding the lock for `item_id`.
    ///
    /// Everything `f` reads through the [`ItemTransaction`] stays valid until it
    /// returns, so a count-then-insert or find-then-complete inside one call is
    /// atomic with respect to every other writer of that item.
    pub fn with_item<R>(&self, item_id: ItemId, f: impl FnOnce(&ItemTransaction<'_>) -> R) -> R {
        let lock = self.item_lock(item_id);
        let _guard = lock.lock();
        f(&ItemTransaction {
            ledger: self,
            item_id,
        })
    }

    /// Number of `Borrowed` records for the item.
    pub fn count_active_borrows(&self, item_id: ItemId) -> usize {
        self.records_for_item(item_id)
            .iter()
            .filter(|record| record.is_active())
            .count()
    }

    /// The unique `Borrowed` record for the pair, if any.
    ///
    /// # Errors
    ///
    /// [`LendingError::ConsistencyViolation`] if more than one exists.
    pub fn find_active_borrow(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<TransactionRecord>, LendingError> {
        let mut active: Vec<TransactionRecord> = self
            .records_for_item(item_id)
            .into_iter()
            .filter(|record| record.user_id == user_id && record.is_active())
            .collect();

        match active.len() {
            0 | 1 => Ok(active.pop()),
            count => {
                error!(
                    %user_id,
                    %item_id,
                    active = count,
                    "multiple active borrows for one user and item"
                );
                Err(LendingError::ConsistencyViolation {
                    user_id,
                    item_id,
                    active: count,
                })
            }
        }
    }

    pub fn get(&self, record_id: RecordId) -> Option<TransactionRecord> {
        self.records.get(&record_id).map(|record| record.clone())
    }

    /// Snapshot of every `Borrowed` record, oldest first.
    pub fn active_borrows(&self) -> Vec<TransactionRecord> {
        let mut active: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|record| record.is_active())
            .map(|record| record.clone())
            .collect();
        active.sort_by_key(|record| (record.borrowed_at, record.id));
        active
    }

    /// Every record, newest first.
    pub fn list_all(&self) -> Vec<TransactionRecord> {
        let mut records: Vec<TransactionRecord> =
            self.records.iter().map(|record| record.clone()).collect();
        newest_first(&mut records);
        records
    }

    /// Every record for one user, newest first.
    pub fn list_for_user(&self, user_id: UserId) -> Vec<TransactionRecord> {
        let ids = self
            .by_user
            .get(&user_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        let mut records = self.resolve(&ids);
        newest_first(&mut records);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn item_lock(&self, item_id: ItemId) -> Arc<Mutex<()>> {
        // Clone out of the map so the shard lock is released before blocking.
        Arc::clone(self.item_locks.entry(item_id).or_default().value())
    }

    fn records_for_item(&self, item_id: ItemId) -> Vec<TransactionRecord> {
        let ids = self
            .by_item
            .get(&item_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        self.resolve(&ids)
    }

    fn resolve(&self, ids: &[RecordId]) -> Vec<TransactionRecord> {
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }
}

/// Ledger access scoped to one item while its lock is held.
///
/// Only obtainable through [`Ledger::with_item`].
pub struct ItemTransaction<'a> {
    ledger: &'a Ledger,
    item_id: ItemId,
}

impl ItemTransaction<'_> {
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn count_active_borrows(&self) -> usize {
        self.ledger.count_active_borrows(self.item_id)
    }

    pub fn find_active_borrow(
        &self,
        user_id: UserId,
    ) -> Result<Option<TransactionRecord>, LendingError> {
        self.ledger.find_active_borrow(user_id, self.item_id)
    }

    /// Inserts a new `Borrowed` record stamped with the current time.
    ///
    /// Performs no capacity or duplicate checks; callers decide that first
    /// within the same transaction.
    pub fn create_borrow(&self, user_id: UserId) -> TransactionRecord {
        let ledger = self.ledger;
        let id = RecordId(ledger.next_record_id.fetch_add(1, Ordering::Relaxed));
        let record = TransactionRecord {
            id,
            user_id,
            item_id: self.item_id,
            status: LendingStatus::Borrowed,
            borrowed_at: ledger.clock.utc(),
            returned_at: None,
        };

        ledger.records.insert(id, record.clone());
        ledger.by_item.entry(self.item_id).or_default().push(id);
        ledger.by_user.entry(user_id).or_default().push(id);
        record
    }

    /// Marks a `Borrowed` record as `Returned` now.
    ///
    /// # Errors
    ///
    /// [`LendingError::RecordNotFound`] if the record does not exist, belongs to
    /// another item, or is not `Borrowed`.
    pub fn complete_return(&self, record_id: RecordId) -> Result<TransactionRecord, LendingError> {
        self.transition(record_id, |record, now| {
            record.status = LendingStatus::Returned;
            record.returned_at = Some(now.max(record.borrowed_at));
        })
    }

    /// Marks a `Borrowed` record as `Unreturned`. `returned_at` stays empty.
    ///
    /// # Errors
    ///
    /// Same as [`ItemTransaction::complete_return`].
    pub fn mark_unreturned(&self, record_id: RecordId) -> Result<TransactionRecord, LendingError> {
        self.transition(record_id, |record, _| {
            record.status = LendingStatus::Unreturned;
        })
    }

    fn transition(
        &self,
        record_id: RecordId,
        apply: impl FnOnce(&mut TransactionRecord, DateTime<Utc>),
    ) -> Result<TransactionRecord, LendingError> {
        let now = self.ledger.clock.utc();
        let mut record = self
            .ledger
            .records
            .get_mut(&record_id)
            .ok_or(LendingError::RecordNotFound)?;

        if record.item_id != self.item_id || !record.is_active() {
            return Err(LendingError::RecordNotFound);
        }

        apply(&mut *record, now);
        Ok(record.clone())
    }
}

fn newest_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeDelta, TimeZone};

    struct StepClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl StepClock {
        fn advance(&self, by: TimeDelta) {
            let mut now = self.now.lock();
            *now += by;
        }

        fn rewind(&self, by: TimeDelta) {
            let mut now = self.now.lock();
            *now -= by;
        }
    }

    impl Clock for StepClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            *self.now.lock()
        }
    }

    fn ledger() -> (Ledger, Arc<StepClock>) {
        let clock = Arc::new(StepClock {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap()),
        });
        (Ledger::new(clock.clone()), clock)
    }

    #[test]
    fn create_borrow_counts_toward_item() {
        let (ledger, _) = ledger();
        ledger.with_item(ItemId(1), |txn| {
            txn.create_borrow(UserId(1));
            txn.create_borrow(UserId(2));
        });
        ledger.with_item(ItemId(2), |txn| txn.create_borrow(UserId(1)));

        assert_eq!(ledger.count_active_borrows(ItemId(1)), 2);
        assert_eq!(ledger.count_active_borrows(ItemId(2)), 1);
        assert_eq!(ledger.count_active_borrows(ItemId(3)), 0);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn find_active_borrow_matches_pair() {
        let (ledger, _) = ledger();
        let record = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));

        assert_eq!(ledger.find_active_borrow(UserId(1), ItemId(1)), Ok(Some(record)));
        assert_eq!(ledger.find_active_borrow(UserId(2), ItemId(1)), Ok(None));
        assert_eq!(ledger.find_active_borrow(UserId(1), ItemId(2)), Ok(None));
    }

    #[test]
    fn complete_return_sets_timestamp() {
        let (ledger, clock) = ledger();
        let record = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));
        clock.advance(TimeDelta::hours(3));

        let returned = ledger
            .with_item(ItemId(1), |txn| txn.complete_return(record.id))
            .unwrap();

        assert_eq!(returned.status, LendingStatus::Returned);
        assert_eq!(returned.returned_at, Some(record.borrowed_at + TimeDelta::hours(3)));
        assert_eq!(ledger.count_active_borrows(ItemId(1)), 0);
        assert_eq!(ledger.find_active_borrow(UserId(1), ItemId(1)), Ok(None));
    }

    #[test]
    fn complete_return_never_precedes_borrow() {
        let (ledger, clock) = ledger();
        let record = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));
        clock.rewind(TimeDelta::minutes(5));

        let returned = ledger
            .with_item(ItemId(1), |txn| txn.complete_return(record.id))
            .unwrap();
        assert_eq!(returned.returned_at, Some(record.borrowed_at));
    }

    #[test]
    fn complete_return_twice_fails() {
        let (ledger, _) = ledger();
        let record = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));
        ledger
            .with_item(ItemId(1), |txn| txn.complete_return(record.id))
            .unwrap();

        let again = ledger.with_item(ItemId(1), |txn| txn.complete_return(record.id));
        assert_eq!(again, Err(LendingError::RecordNotFound));
    }

    #[test]
    fn transitions_are_scoped_to_the_locked_item() {
        let (ledger, _) = ledger();
        let record = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));

        let result = ledger.with_item(ItemId(2), |txn| txn.complete_return(record.id));
        assert_eq!(result, Err(LendingError::RecordNotFound));
        let result = ledger.with_item(ItemId(1), |txn| txn.complete_return(RecordId(999)));
        assert_eq!(result, Err(LendingError::RecordNotFound));
        assert!(ledger.get(record.id).unwrap().is_active());
    }

    #[test]
    fn mark_unreturned_leaves_returned_at_empty() {
        let (ledger, _) = ledger();
        let record = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));

        let marked = ledger
            .with_item(ItemId(1), |txn| txn.mark_unreturned(record.id))
            .unwrap();
        assert_eq!(marked.status, LendingStatus::Unreturned);
        assert_eq!(marked.returned_at, None);

        // Terminal: cannot be returned or re-marked.
        let result = ledger.with_item(ItemId(1), |txn| txn.complete_return(record.id));
        assert_eq!(result, Err(LendingError::RecordNotFound));
        assert_eq!(ledger.count_active_borrows(ItemId(1)), 0);
    }

    #[test]
    fn duplicate_active_borrow_is_a_consistency_violation() {
        let (ledger, _) = ledger();
        ledger.with_item(ItemId(4), |txn| {
            txn.create_borrow(UserId(2));
            txn.create_borrow(UserId(2));
        });

        assert_eq!(
            ledger.find_active_borrow(UserId(2), ItemId(4)),
            Err(LendingError::ConsistencyViolation {
                user_id: UserId(2),
                item_id: ItemId(4),
                active: 2,
            })
        );
    }

    #[test]
    fn listings_are_newest_first() {
        let (ledger, clock) = ledger();
        let first = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));
        clock.advance(TimeDelta::minutes(1));
        let second = ledger.with_item(ItemId(2), |txn| txn.create_borrow(UserId(2)));
        clock.advance(TimeDelta::minutes(1));
        let third = ledger.with_item(ItemId(3), |txn| txn.create_borrow(UserId(1)));

        let all: Vec<RecordId> = ledger.list_all().iter().map(|r| r.id).collect();
        assert_eq!(all, vec![third.id, second.id, first.id]);

        let mine: Vec<RecordId> = ledger.list_for_user(UserId(1)).iter().map(|r| r.id).collect();
        assert_eq!(mine, vec![third.id, first.id]);
        assert!(ledger.list_for_user(UserId(42)).is_empty());
    }

    #[test]
    fn same_instant_ties_break_on_record_id() {
        let (ledger, _) = ledger();
        let first = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));
        let second = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(2)));

        let all: Vec<RecordId> = ledger.list_all().iter().map(|r| r.id).collect();
        assert_eq!(all, vec![second.id, first.id]);
    }

    #[test]
    fn active_borrows_snapshot_skips_closed_records() {
        let (ledger, _) = ledger();
        let open = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(1)));
        let closed = ledger.with_item(ItemId(1), |txn| txn.create_borrow(UserId(2)));
        ledger
            .with_item(ItemId(1), |txn| txn.complete_return(closed.id))
            .unwrap();

        assert_eq!(ledger.active_borrows(), vec![open]);
    }
}
