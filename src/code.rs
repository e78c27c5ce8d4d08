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

//! Scannable code issuing.
//!
//! Codes follow the template `<PREFIX>-<KEY>-<SUFFIX>`:
//!
//! - `PREFIX` is `USR` for users and `ITM` for items.
//! - `KEY` is the entity's natural key, upper-cased, with every run of
//!   non-alphanumeric characters collapsed to `_`.
//! - `SUFFIX` is a random UUIDv4 in upper-case simple form, so two codes issued
//!   in the same instant for the same key still differ.
//!
//! ```
//! use lending_ledger_rs::code::{issue_code, CodeKind};
//!
//! let code = issue_code(CodeKind::Item, "Cordless Drill");
//! assert!(code.as_str().starts_with("ITM-CORDLESS_DRILL-"));
//! ```

use crate::base::ScanCode;
use uuid::Uuid;

/// Which registry a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    User,
    Item,
}

impl CodeKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::User => "USR",
            Self::Item => "ITM",
        }
    }
}

/// Issues a fresh scannable code for the given natural key.
pub fn issue_code(kind: CodeKind, natural_key: &str) -> ScanCode {
    let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
    ScanCode::from(format!(
        "{}-{}-{}",
        kind.prefix(),
        normalize_key(natural_key),
        suffix
    ))
}

/// Normalizes a natural key for embedding in a code.
///
/// Leading and trailing separators are dropped. A key with no alphanumeric
/// characters becomes `NA`.
pub fn normalize_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.push(ch.to_ascii_uppercase());
        } else {
            pending_separator = true;
        }
    }

    if key.is_empty() {
        key.push_str("NA");
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_key("Cordless  Drill (18V)"), "CORDLESS_DRILL_18V");
        assert_eq!(normalize_key("  2024-00142 "), "2024_00142");
        assert_eq!(normalize_key("abc"), "ABC");
    }

    #[test]
    fn normalize_empty_key_falls_back() {
        assert_eq!(normalize_key(""), "NA");
        assert_eq!(normalize_key("---"), "NA");
        assert_eq!(normalize_key("Überschall"), "BERSCHALL");
    }

    #[test]
    fn codes_follow_template() {
        let code = issue_code(CodeKind::User, "2024-001");
        let parts: Vec<&str> = code.as_str().splitn(3, '-').collect();
        assert_eq!(parts[0], "USR");
        assert_eq!(parts[1], "2024_001");
        assert_eq!(parts[2].len(), 32);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn rapid_issuing_never_collides() {
        let codes: HashSet<_> = (0..10_000)
            .map(|_| issue_code(CodeKind::Item, "Drill"))
            .collect();
        assert_eq!(codes.len(), 10_000);
    }
}
