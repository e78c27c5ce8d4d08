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

//! Bulk registration from CSV.
//!
//! Imports are best-effort: each valid row is registered on its own and bad
//! rows are reported back without stopping the import.
//!
//! # CSV Formats
//!
//! ```csv
//! external_id,first_name,last_name,role,department
//! 2024-001,Ada,Lovelace,student,Engineering
//! ```
//!
//! ```csv
//! name,quantity
//! Cordless Drill,2
//! ```

use crate::LendingError;
use crate::registry::{BulkReport, Item, NewItem, NewUser, Registry, User, UserRole};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::io::Read;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct UserRow {
    external_id: String,
    first_name: String,
    last_name: String,
    role: String,
    // `None` when the trailing column is left off entirely.
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemRow {
    name: String,
    quantity: u32,
}

impl TryFrom<UserRow> for NewUser {
    type Error = LendingError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row.role.parse::<UserRole>()?,
            external_id: row.external_id,
            first_name: row.first_name,
            last_name: row.last_name,
            department: row.department.unwrap_or_default(),
        })
    }
}

impl From<ItemRow> for NewItem {
    fn from(row: ItemRow) -> Self {
        Self::new(row.name, row.quantity)
    }
}

/// Why a row was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportFailure {
    /// Row could not be parsed.
    Malformed(String),
    /// Row parsed but the registry refused it.
    Rejected(LendingError),
}

/// Result of one import, with zero-based data row indexes (header excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport<T> {
    pub created: Vec<T>,
    pub failed: Vec<(usize, ImportFailure)>,
}

/// Imports users from CSV.
///
/// # Errors
///
/// Returns a CSV error only if the header cannot be read.
pub fn import_users<R: Read>(registry: &Registry, reader: R) -> Result<ImportReport<User>, csv::Error> {
    import(reader, |rows| registry.register_users(rows), |row: UserRow| {
        NewUser::try_from(row)
    })
}

/// Imports items from CSV.
///
/// # Errors
///
/// Returns a CSV error only if the header cannot be read.
pub fn import_items<R: Read>(registry: &Registry, reader: R) -> Result<ImportReport<Item>, csv::Error> {
    import(reader, |rows| registry.register_items(rows), |row: ItemRow| {
        Ok(NewItem::from(row))
    })
}

fn import<R, Row, New, T>(
    reader: R,
    register: impl FnOnce(Vec<New>) -> BulkReport<T>,
    convert: impl Fn(Row) -> Result<New, LendingError>,
) -> Result<ImportReport<T>, csv::Error>
where
    R: Read,
    Row: for<'de> Deserialize<'de>,
{
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // department may be omitted
        .has_headers(true)
        .from_reader(reader);
    rdr.headers()?;

    let mut failed = Vec::new();
    // Source row index of each entry handed to the registry.
    let mut origin = Vec::new();
    let mut rows = Vec::new();

    for (index, result) in rdr.deserialize::<Row>().enumerate() {
        match result.map_err(|e| ImportFailure::Malformed(e.to_string())).and_then(|row| {
            convert(row).map_err(ImportFailure::Rejected)
        }) {
            Ok(new) => {
                origin.push(index);
                rows.push(new);
            }
            Err(failure) => {
                warn!(row = index, ?failure, "skipping import row");
                failed.push((index, failure));
            }
        }
    }

    let bulk = register(rows);
    failed.extend(bulk.failed.into_iter().filter_map(|(position, e)| {
        origin
            .get(position)
            .map(|index| (*index, ImportFailure::Rejected(e)))
    }));
    failed.sort_by_key(|(index, _)| *index);

    info!(
        created = bulk.created.len(),
        failed = failed.len(),
        "import finished"
    );
    Ok(ImportReport {
        created: bulk.created,
        failed,
    })
}
