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

//! # Lending Ledger
//!
//! This library tracks tools and assets lent out to registered users. Users and
//! items each carry a scannable (QR) code; a front-desk scan borrows or returns
//! an item, and a periodic sweep flags borrows that were never brought back.
//!
//! ## Core Components
//!
//! - [`Registry`]: Users and items, looked up by id or scannable code
//! - [`Ledger`]: Borrow/return records with per-item atomic sections
//! - [`ScanDispatcher`]: Borrow/return state machine behind every scan
//! - [`OverdueSweeper`]: Reclassifies stale borrows as unreturned
//! - [`LendingError`]: Error types for rejected requests
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use lending_ledger_rs::{
//!     LendingError, Ledger, NewItem, NewUser, Registry, ScanDispatcher, UserRole,
//! };
//!
//! let registry = Arc::new(Registry::new());
//! let ledger = Arc::new(Ledger::new(Arc::new(mockable::DefaultClock)));
//! let dispatcher = ScanDispatcher::new(registry.clone(), ledger.clone());
//!
//! let new_user = |id: &str| NewUser {
//!     external_id: id.into(),
//!     first_name: "Front".into(),
//!     last_name: "Desk".into(),
//!     role: UserRole::Staff,
//!     department: String::new(),
//! };
//! let a = registry.register_user(new_user("A")).unwrap();
//! let b = registry.register_user(new_user("B")).unwrap();
//! let drill = registry.register_item(NewItem::new("Drill", 1)).unwrap();
//!
//! dispatcher.scan(a.id, drill.code.as_str()).unwrap();
//! assert_eq!(
//!     dispatcher.scan(b.id, drill.code.as_str()),
//!     Err(LendingError::CapacityExceeded)
//! );
//! ```
//!
//! ## Thread Safety
//!
//! Every component can be shared behind an [`Arc`](std::sync::Arc). Scans for
//! the same item are serialized by the ledger's per-item lock; scans for
//! different items run in parallel.

mod base;
pub mod code;
mod dispatcher;
pub mod error;
pub mod import;
mod ledger;
mod record;
mod registry;
pub mod settings;
mod sweeper;

pub use base::{ItemId, RecordId, ScanCode, UserId};
pub use dispatcher::{Availability, ScanDispatcher, ScanIntent, ScanOutcome, ScanReceipt};
pub use error::LendingError;
pub use ledger::{ItemTransaction, Ledger, SharedClock};
pub use record::{LendingStatus, TransactionRecord, TransactionView};
pub use registry::{
    BulkReport, Item, ItemStatus, NewItem, NewUser, Registry, User, UserRole, UserStatus,
};
pub use settings::LendingConfig;
pub use sweeper::{OverdueSweeper, SweepHandle, SweepReport};
