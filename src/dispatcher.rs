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

//! Scan dispatching.
//!
//! The [`ScanDispatcher`] turns a scanned item code plus a user into a ledger
//! transition. A plain scan is a toggle:
//!
//! ```text
//!  NONE ──scan──► BORROWED ──scan──► RETURNED
//!                    │
//!                    └──overdue sweep──► UNRETURNED
//! ```
//!
//! `RETURNED` and `UNRETURNED` are terminal for their record. The next scan of
//! the same pair starts a new borrow.
//!
//! # Entry Points
//!
//! | Entry point | Active borrow exists | No active borrow |
//! |-------------|----------------------|------------------|
//! | [`scan`](ScanDispatcher::scan) | return | borrow |
//! | [`borrow`](ScanDispatcher::borrow) | `AlreadyBorrowed` | borrow |
//! | [`return_item`](ScanDispatcher::return_item) | return | `NotBorrowed` |
//!
//! All three go through [`ScanDispatcher::resolve_scan`], which makes the
//! decision inside one [`Ledger::with_item`] section.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lending_ledger_rs::{
//!     Ledger, NewItem, NewUser, Registry, ScanDispatcher, UserRole,
//! };
//!
//! let registry = Arc::new(Registry::new());
//! let ledger = Arc::new(Ledger::new(Arc::new(mockable::DefaultClock)));
//! let dispatcher = ScanDispatcher::new(registry.clone(), ledger.clone());
//!
//! let user = registry
//!     .register_user(NewUser {
//!         external_id: "2024-001".into(),
//!         first_name: "Ada".into(),
//!         last_name: "Lovelace".into(),
//!         role: UserRole::Student,
//!         department: "Engineering".into(),
//!     })
//!     .unwrap();
//! let drill = registry.register_item(NewItem::new("Drill", 2)).unwrap();
//!
//! let receipt = dispatcher.scan(user.id, drill.code.as_str()).unwrap();
//! assert_eq!(receipt.message, "Successfully borrowed \"Drill\"");
//!
//! let receipt = dispatcher.scan(user.id, drill.code.as_str()).unwrap();
//! assert_eq!(receipt.message, "Successfully returned \"Drill\"");
//! ```

use crate::LendingError;
use crate::base::{ItemId, UserId};
use crate::ledger::{ItemTransaction, Ledger};
use crate::record::{TransactionRecord, TransactionView};
use crate::registry::{Item, Registry, User};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanIntent {
    /// Borrow or return, whichever the ledger state implies.
    Toggle,
    Borrow,
    Return,
}

/// Result of resolving one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Borrowed(TransactionView),
    Returned(TransactionView),
    Rejected(LendingError),
}

impl ScanOutcome {
    /// Converts the outcome into a receipt carrying the user-facing message.
    pub fn into_result(self) -> Result<ScanReceipt, LendingError> {
        match self {
            Self::Borrowed(transaction) => Ok(ScanReceipt {
                message: format!("Successfully borrowed \"{}\"", transaction.item.name),
                transaction,
            }),
            Self::Returned(transaction) => Ok(ScanReceipt {
                message: format!("Successfully returned \"{}\"", transaction.item.name),
                transaction,
            }),
            Self::Rejected(e) => Err(e),
        }
    }
}

/// Successful scan response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReceipt {
    pub message: String,
    pub transaction: TransactionView,
}

/// Units of an item currently out and still on the shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub item: Item,
    pub borrowed: usize,
    pub available: usize,
}

/// Borrow/return state machine over a registry and a ledger.
///
/// Holds no state of its own: every scan re-reads the ledger.
pub struct ScanDispatcher {
    registry: Arc<Registry>,
    ledger: Arc<Ledger>,
}

impl ScanDispatcher {
    pub fn new(registry: Arc<Registry>, ledger: Arc<Ledger>) -> Self {
        Self { registry, ledger }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Toggle scan: returns the item if the user holds it, otherwise borrows it.
    ///
    /// # Errors
    ///
    /// - [`LendingError::ItemNotFound`] - Item code does not resolve.
    /// - [`LendingError::UserNotFound`] - User id does not resolve.
    /// - [`LendingError::CapacityExceeded`] - Every unit is already out.
    /// - [`LendingError::UserInactive`] / [`LendingError::ItemRetired`] - Borrowing is blocked.
    pub fn scan(&self, user_id: UserId, item_code: &str) -> Result<ScanReceipt, LendingError> {
        self.resolve_scan(user_id, item_code, ScanIntent::Toggle)
            .into_result()
    }

    /// Toggle scan with both sides given as scannable codes.
    pub fn scan_codes(&self, user_code: &str, item_code: &str) -> Result<ScanReceipt, LendingError> {
        let user = self.registry.user_by_code(user_code)?;
        self.scan(user.id, item_code)
    }

    /// Explicit borrow. `count` must be at least one; a single ledger record
    /// is created regardless of its value.
    ///
    /// # Errors
    ///
    /// As [`ScanDispatcher::scan`], plus [`LendingError::AlreadyBorrowed`] and
    /// [`LendingError::InvalidCount`].
    pub fn borrow(
        &self,
        user_id: UserId,
        item_code: &str,
        count: u32,
    ) -> Result<ScanReceipt, LendingError> {
        check_count(count)?;
        self.resolve_scan(user_id, item_code, ScanIntent::Borrow)
            .into_result()
    }

    /// Explicit return.
    ///
    /// # Errors
    ///
    /// [`LendingError::ItemNotFound`], [`LendingError::UserNotFound`],
    /// [`LendingError::NotBorrowed`] and [`LendingError::InvalidCount`].
    pub fn return_item(
        &self,
        user_id: UserId,
        item_code: &str,
        count: u32,
    ) -> Result<ScanReceipt, LendingError> {
        check_count(count)?;
        self.resolve_scan(user_id, item_code, ScanIntent::Return)
            .into_result()
    }

    /// Decides and applies the transition for one scan.
    pub fn resolve_scan(&self, user_id: UserId, item_code: &str, intent: ScanIntent) -> ScanOutcome {
        match self.try_resolve(user_id, item_code, intent) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(%user_id, item_code, ?intent, error = %e, "scan rejected");
                ScanOutcome::Rejected(e)
            }
        }
    }

    fn try_resolve(
        &self,
        user_id: UserId,
        item_code: &str,
        intent: ScanIntent,
    ) -> Result<ScanOutcome, LendingError> {
        let item = self.registry.item_by_code(item_code)?;
        let user = self.registry.user_by_id(user_id)?;

        self.ledger.with_item(item.id, |txn| {
            // The single place where "does this user hold this item" is decided.
            match (intent, txn.find_active_borrow(user.id)?) {
                (ScanIntent::Borrow, Some(_)) => Err(LendingError::AlreadyBorrowed),
                (ScanIntent::Return, None) => Err(LendingError::NotBorrowed),
                (ScanIntent::Toggle | ScanIntent::Return, Some(active)) => {
                    let record = txn.complete_return(active.id)?;
                    info!(record_id = %record.id, %user_id, item_id = %item.id, "item returned");
                    Ok(ScanOutcome::Returned(TransactionView { record, user, item }))
                }
                (ScanIntent::Toggle | ScanIntent::Borrow, None) => {
                    let (record, item) = self.open_borrow(txn, &user)?;
                    info!(record_id = %record.id, %user_id, item_id = %item.id, "item borrowed");
                    Ok(ScanOutcome::Borrowed(TransactionView { record, user, item }))
                }
            }
        })
    }

    fn open_borrow(
        &self,
        txn: &ItemTransaction<'_>,
        user: &User,
    ) -> Result<(TransactionRecord, Item), LendingError> {
        if !user.is_active() {
            return Err(LendingError::UserInactive);
        }

        // Quantity or status may have changed since the code lookup.
        let item = self.registry.item_by_id(txn.item_id())?;
        if item.is_retired() {
            return Err(LendingError::ItemRetired);
        }

        let active = txn.count_active_borrows();
        if active >= item.quantity as usize {
            return Err(LendingError::CapacityExceeded);
        }

        Ok((txn.create_borrow(user.id), item))
    }

    /// Current capacity usage of an item.
    pub fn availability(&self, item_code: &str) -> Result<Availability, LendingError> {
        let item = self.registry.item_by_code(item_code)?;
        let borrowed = self.ledger.count_active_borrows(item.id);
        Ok(Availability {
            available: (item.quantity as usize).saturating_sub(borrowed),
            borrowed,
            item,
        })
    }

    /// Every transaction, newest first.
    pub fn list_all_transactions(&self) -> Vec<TransactionView> {
        self.expand(self.ledger.list_all())
    }

    /// One user's transactions, newest first. Unknown users have none.
    pub fn list_user_transactions(&self, user_id: UserId) -> Vec<TransactionView> {
        self.expand(self.ledger.list_for_user(user_id))
    }

    fn expand(&self, records: Vec<TransactionRecord>) -> Vec<TransactionView> {
        records
            .into_iter()
            .filter_map(|record| match self.lookup(record.user_id, record.item_id) {
                Ok((user, item)) => Some(TransactionView { record, user, item }),
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "record references unknown entity");
                    None
                }
            })
            .collect()
    }

    fn lookup(&self, user_id: UserId, item_id: ItemId) -> Result<(User, Item), LendingError> {
        Ok((
            self.registry.user_by_id(user_id)?,
            self.registry.item_by_id(item_id)?,
        ))
    }
}

fn check_count(count: u32) -> Result<(), LendingError> {
    if count == 0 {
        return Err(LendingError::InvalidCount);
    }
    Ok(())
}
