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

//! Ledger records.
//!
//! A record is created once per borrow and transitions at most once:
//! - [`Borrowed`] → [`Returned`] (scan or explicit return, sets `returned_at`)
//! - [`Borrowed`] → [`Unreturned`] (overdue sweep, leaves `returned_at` empty)
//!
//! [`Borrowed`]: LendingStatus::Borrowed
//! [`Returned`]: LendingStatus::Returned
//! [`Unreturned`]: LendingStatus::Unreturned

use crate::base::{ItemId, RecordId, UserId};
use crate::registry::{Item, User};
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LendingStatus {
    Borrowed,
    Returned,
    Unreturned,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub item_id: ItemId,
    pub status: LendingStatus,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// An active borrow counts against the item's capacity.
    pub fn is_active(&self) -> bool {
        self.status == LendingStatus::Borrowed
    }
}

/// A record with its user and item expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionView {
    pub record: TransactionRecord,
    pub user: User,
    pub item: Item,
}

// Flattened so the view can be written as a CSV row.
impl Serialize for TransactionView {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TransactionView", 10)?;
        state.serialize_field("id", &self.record.id)?;
        state.serialize_field("user_id", &self.user.id)?;
        state.serialize_field("user_code", &self.user.code)?;
        state.serialize_field("user_name", &self.user.full_name())?;
        state.serialize_field("item_id", &self.item.id)?;
        state.serialize_field("item_code", &self.item.code)?;
        state.serialize_field("item_name", &self.item.name)?;
        state.serialize_field("status", &self.record.status)?;
        state.serialize_field("borrowed_at", &self.record.borrowed_at)?;
        state.serialize_field("returned_at", &self.record.returned_at)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ScanCode;
    use crate::registry::{ItemStatus, UserRole, UserStatus};
    use chrono::TimeZone;

    fn view(status: LendingStatus, returned_at: Option<DateTime<Utc>>) -> TransactionView {
        let borrowed_at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        TransactionView {
            record: TransactionRecord {
                id: RecordId(5),
                user_id: UserId(1),
                item_id: ItemId(2),
                status,
                borrowed_at,
                returned_at,
            },
            user: User {
                id: UserId(1),
                external_id: "S-1".to_owned(),
                code: ScanCode::from("USR-S_1-AAAA"),
                first_name: "Grace".to_owned(),
                last_name: "Hopper".to_owned(),
                role: UserRole::Teacher,
                department: "Physics".to_owned(),
                status: UserStatus::Active,
            },
            item: Item {
                id: ItemId(2),
                code: ScanCode::from("ITM-DRILL-BBBB"),
                name: "Drill".to_owned(),
                quantity: 2,
                status: ItemStatus::Active,
            },
        }
    }

    #[test]
    fn only_borrowed_records_are_active() {
        assert!(view(LendingStatus::Borrowed, None).record.is_active());
        assert!(!view(LendingStatus::Returned, None).record.is_active());
        assert!(!view(LendingStatus::Unreturned, None).record.is_active());
    }

    #[test]
    fn view_serializes_flat() {
        let json = serde_json::to_value(view(LendingStatus::Borrowed, None)).unwrap();

        assert_eq!(json["id"], 5);
        assert_eq!(json["user_code"], "USR-S_1-AAAA");
        assert_eq!(json["user_name"], "Grace Hopper");
        assert_eq!(json["item_name"], "Drill");
        assert_eq!(json["status"], "BORROWED");
        assert_eq!(json["borrowed_at"], "2025-03-01T09:00:00Z");
        assert!(json["returned_at"].is_null());
    }

    #[test]
    fn view_writes_csv_row() {
        let returned_at = Utc.with_ymd_and_hms(2025, 3, 1, 17, 30, 0).unwrap();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .serialize(view(LendingStatus::Returned, Some(returned_at)))
            .unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("id,user_id,user_code,user_name,item_id,item_code,item_name,status,borrowed_at,returned_at")
        );
        assert_eq!(
            lines.next(),
            Some("5,1,USR-S_1-AAAA,Grace Hopper,2,ITM-DRILL-BBBB,Drill,RETURNED,2025-03-01T09:00:00Z,2025-03-01T17:30:00Z")
        );
    }
}
