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

//! Identity registry for users and items.
//!
//! Every entity gets a scannable code at registration (see [`crate::code`]).
//! Entities are never hard-deleted: users are deactivated and items are retired,
//! so every ledger record keeps resolving to the user and item it references.
//!
//! # Example
//!
//! ```
//! use lending_ledger_rs::{NewItem, Registry};
//!
//! let registry = Registry::new();
//! let drill = registry.register_item(NewItem::new("Drill", 2)).unwrap();
//! let found = registry.item_by_code(drill.code.as_str()).unwrap();
//! assert_eq!(found.id, drill.id);
//! ```

use crate::LendingError;
use crate::base::{ItemId, ScanCode, UserId};
use crate::code::{CodeKind, issue_code};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Student,
    Staff,
    Teacher,
    Admin,
}

impl FromStr for UserRole {
    type Err = LendingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "staff" => Ok(Self::Staff),
            "teacher" => Ok(Self::Teacher),
            "admin" => Ok(Self::Admin),
            _ => Err(LendingError::InvalidField("role")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Active,
    Retired,
}

/// A registered borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Natural key (student or staff number), unique across users.
    pub external_id: String,
    pub code: ScanCode,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub department: String,
    pub status: UserStatus,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Registration data for a user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub department: String,
}

/// A trackable item. `quantity` is the ceiling on simultaneous active borrows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub code: ScanCode,
    pub name: String,
    pub quantity: u32,
    pub status: ItemStatus,
}

impl Item {
    pub fn is_retired(&self) -> bool {
        self.status == ItemStatus::Retired
    }
}

/// Registration data for an item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub quantity: u32,
}

impl NewItem {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// Outcome of a best-effort bulk registration.
///
/// Rows are created independently; a failed row never undoes the rows before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkReport<T> {
    pub created: Vec<T>,
    /// Zero-based row index and the reason the row was rejected.
    pub failed: Vec<(usize, LendingError)>,
}

impl<T> BulkReport<T> {
    fn new() -> Self {
        Self {
            created: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Users and items, indexed by id and by scannable code.
#[derive(Debug)]
pub struct Registry {
    users: DashMap<UserId, User>,
    user_codes: DashMap<ScanCode, UserId>,
    external_ids: DashMap<String, UserId>,
    items: DashMap<ItemId, Item>,
    item_codes: DashMap<ScanCode, ItemId>,
    next_user_id: AtomicU32,
    next_item_id: AtomicU32,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            user_codes: DashMap::new(),
            external_ids: DashMap::new(),
            items: DashMap::new(),
            item_codes: DashMap::new(),
            next_user_id: AtomicU32::new(1),
            next_item_id: AtomicU32::new(1),
        }
    }

    /// Registers a user and issues their scannable code.
    ///
    /// # Errors
    ///
    /// - [`LendingError::InvalidField`] - External id or a name field is blank.
    /// - [`LendingError::DuplicateExternalId`] - Another user has the same external id.
    /// - [`LendingError::DuplicateCode`] - The issued code is already taken.
    pub fn register_user(&self, new_user: NewUser) -> Result<User, LendingError> {
        let external_id = required(&new_user.external_id, "external_id")?.to_owned();
        let first_name = required(&new_user.first_name, "first_name")?.to_owned();
        let last_name = required(&new_user.last_name, "last_name")?.to_owned();

        // Reserve the natural key first so concurrent imports of the same row
        // cannot both succeed. Ids are only drawn for accepted keys.
        let id = match self.external_ids.entry(external_id.clone()) {
            Entry::Occupied(_) => return Err(LendingError::DuplicateExternalId),
            Entry::Vacant(entry) => {
                let id = UserId(self.next_user_id.fetch_add(1, Ordering::Relaxed));
                entry.insert(id);
                id
            }
        };

        let user = User {
            id,
            code: issue_code(CodeKind::User, &external_id),
            external_id,
            first_name,
            last_name,
            role: new_user.role,
            department: new_user.department.trim().to_owned(),
            status: UserStatus::Active,
        };
        self.users.insert(id, user.clone());

        if let Err(e) = claim_code(&self.user_codes, &user.code, id) {
            self.users.remove(&id);
            self.external_ids.remove(&user.external_id);
            return Err(e);
        }

        info!(user_id = %id, code = %user.code, "registered user");
        Ok(user)
    }

    /// Registers an item and issues its scannable code.
    ///
    /// # Errors
    ///
    /// - [`LendingError::InvalidField`] - Name is blank.
    /// - [`LendingError::InvalidQuantity`] - Quantity is zero.
    /// - [`LendingError::DuplicateCode`] - The issued code is already taken.
    pub fn register_item(&self, new_item: NewItem) -> Result<Item, LendingError> {
        let name = required(&new_item.name, "name")?.to_owned();
        if new_item.quantity == 0 {
            return Err(LendingError::InvalidQuantity);
        }

        let id = ItemId(self.next_item_id.fetch_add(1, Ordering::Relaxed));
        let item = Item {
            id,
            code: issue_code(CodeKind::Item, &name),
            name,
            quantity: new_item.quantity,
            status: ItemStatus::Active,
        };
        self.items.insert(id, item.clone());

        if let Err(e) = claim_code(&self.item_codes, &item.code, id) {
            self.items.remove(&id);
            return Err(e);
        }

        info!(item_id = %id, code = %item.code, quantity = item.quantity, "registered item");
        Ok(item)
    }

    /// Registers each user in turn, continuing past rejected rows.
    pub fn register_users<I>(&self, rows: I) -> BulkReport<User>
    where
        I: IntoIterator<Item = NewUser>,
    {
        let mut report = BulkReport::new();
        for (row, new_user) in rows.into_iter().enumerate() {
            match self.register_user(new_user) {
                Ok(user) => report.created.push(user),
                Err(e) => {
                    debug!(row, error = %e, "skipping user row");
                    report.failed.push((row, e));
                }
            }
        }
        report
    }

    /// Registers each item in turn, continuing past rejected rows.
    pub fn register_items<I>(&self, rows: I) -> BulkReport<Item>
    where
        I: IntoIterator<Item = NewItem>,
    {
        let mut report = BulkReport::new();
        for (row, new_item) in rows.into_iter().enumerate() {
            match self.register_item(new_item) {
                Ok(item) => report.created.push(item),
                Err(e) => {
                    debug!(row, error = %e, "skipping item row");
                    report.failed.push((row, e));
                }
            }
        }
        report
    }

    /// Looks a user up by exact scannable code.
    pub fn user_by_code(&self, code: &str) -> Result<User, LendingError> {
        let id = *self
            .user_codes
            .get(code)
            .ok_or(LendingError::UserNotFound)?;
        self.user_by_id(id)
    }

    pub fn user_by_id(&self, id: UserId) -> Result<User, LendingError> {
        self.users
            .get(&id)
            .map(|user| user.clone())
            .ok_or(LendingError::UserNotFound)
    }

    /// Looks an item up by exact scannable code.
    pub fn item_by_code(&self, code: &str) -> Result<Item, LendingError> {
        let id = *self
            .item_codes
            .get(code)
            .ok_or(LendingError::ItemNotFound)?;
        self.item_by_id(id)
    }

    pub fn item_by_id(&self, id: ItemId) -> Result<Item, LendingError> {
        self.items
            .get(&id)
            .map(|item| item.clone())
            .ok_or(LendingError::ItemNotFound)
    }

    /// All users, ordered by id.
    pub fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|user| user.clone()).collect();
        users.sort_by_key(|user| user.id);
        users
    }

    /// All items, ordered by id.
    pub fn items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.items.iter().map(|item| item.clone()).collect();
        items.sort_by_key(|item| item.id);
        items
    }

    /// Activates or deactivates a user. Deactivation is the only form of user deletion.
    pub fn set_user_status(&self, id: UserId, status: UserStatus) -> Result<User, LendingError> {
        let mut user = self.users.get_mut(&id).ok_or(LendingError::UserNotFound)?;
        user.status = status;
        info!(user_id = %id, ?status, "user status changed");
        Ok(user.clone())
    }

    /// Retires an item. Outstanding units can still be returned.
    pub fn retire_item(&self, id: ItemId) -> Result<Item, LendingError> {
        let mut item = self.items.get_mut(&id).ok_or(LendingError::ItemNotFound)?;
        item.status = ItemStatus::Retired;
        info!(item_id = %id, "item retired");
        Ok(item.clone())
    }

    /// Changes the number of units owned.
    ///
    /// May drop below the number currently borrowed; new borrows are then
    /// rejected until enough units come back.
    pub fn set_item_quantity(&self, id: ItemId, quantity: u32) -> Result<Item, LendingError> {
        if quantity == 0 {
            return Err(LendingError::InvalidQuantity);
        }
        let mut item = self.items.get_mut(&id).ok_or(LendingError::ItemNotFound)?;
        item.quantity = quantity;
        info!(item_id = %id, quantity, "item quantity changed");
        Ok(item.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, LendingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LendingError::InvalidField(field));
    }
    Ok(trimmed)
}

/// Atomic check-and-insert on a code index.
fn claim_code<Id>(index: &DashMap<ScanCode, Id>, code: &ScanCode, id: Id) -> Result<(), LendingError> {
    match index.entry(code.clone()) {
        Entry::Occupied(_) => Err(LendingError::DuplicateCode),
        Entry::Vacant(entry) => {
            entry.insert(id);
            Ok(())
        }
    }
}
