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

//! Core identifier types for users, items, ledger records and scannable codes.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trackable item (tool, asset, equipment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ledger record.
///
/// Assigned from a monotonic counter, so a larger id was always created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque string encoded in a QR code or barcode.
///
/// Issued once at registration and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ScanCode(String);

impl ScanCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ScanCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl From<&str> for ScanCode {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

// Lets the code indexes be queried with a plain `&str`.
impl Borrow<str> for ScanCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn identifiers_display_inner_value() {
        assert_eq!(UserId(7).to_string(), "7");
        assert_eq!(ItemId(42).to_string(), "42");
        assert_eq!(RecordId(9001).to_string(), "9001");
    }

    #[test]
    fn scan_code_lookup_by_str() {
        let mut index = HashMap::new();
        index.insert(ScanCode::from("ITM-DRILL-ABC"), ItemId(1));
        assert_eq!(index.get("ITM-DRILL-ABC"), Some(&ItemId(1)));
        assert_eq!(index.get("ITM-DRILL-XYZ"), None);
    }

    #[test]
    fn identifiers_serialize_transparently() {
        assert_eq!(serde_json::to_string(&UserId(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&ScanCode::from("USR-1-A")).unwrap(),
            "\"USR-1-A\""
        );
    }
}
