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

//! Error types for registry, ledger and scan processing.

use crate::base::{ItemId, UserId};
use thiserror::Error;

/// Lending errors.
///
/// Everything except [`LendingError::ConsistencyViolation`] is a business-rule
/// rejection: it happens before any ledger mutation, so the caller may simply
/// re-submit the request later.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    /// User id or scannable code does not resolve
    #[error("user not found")]
    UserNotFound,

    /// Item id or scannable code does not resolve
    #[error("item not found")]
    ItemNotFound,

    /// Ledger record does not exist or is no longer borrowed
    #[error("transaction record not found")]
    RecordNotFound,

    /// Every unit of the item is already out
    #[error("no units of this item are available")]
    CapacityExceeded,

    /// User already holds this item (explicit borrow only)
    #[error("user already has this item borrowed")]
    AlreadyBorrowed,

    /// User does not hold this item (explicit return only)
    #[error("user has not borrowed this item")]
    NotBorrowed,

    /// Inactive users cannot borrow
    #[error("user account is inactive")]
    UserInactive,

    /// Retired items cannot be borrowed
    #[error("item has been retired")]
    ItemRetired,

    /// Borrow/return count must be at least one
    #[error("invalid count (must be at least 1)")]
    InvalidCount,

    /// Item quantity must be at least one
    #[error("invalid quantity (must be at least 1)")]
    InvalidQuantity,

    /// Required field is blank
    #[error("missing value for {0}")]
    InvalidField(&'static str),

    /// Another user already uses this external id
    #[error("duplicate external id")]
    DuplicateExternalId,

    /// Generated scannable code is already issued
    #[error("duplicate scannable code")]
    DuplicateCode,

    /// More than one active borrow exists for a single user/item pair
    #[error("consistency violation: {active} active borrows for user {user_id} and item {item_id}")]
    ConsistencyViolation {
        user_id: UserId,
        item_id: ItemId,
        active: usize,
    },
}
