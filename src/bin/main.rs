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

use clap::Parser;
use csv::Writer;
use lending_ledger_rs::import::{import_items, import_users};
use lending_ledger_rs::{
    LendingConfig, LendingError, Ledger, OverdueSweeper, Registry, ScanDispatcher, ScanReceipt,
    SharedClock,
};
use mockable::DefaultClock;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Lending Ledger - Front-desk scan terminal
///
/// Registers users and items from CSV, then reads scans from stdin, one per
/// line, and prints a receipt for each. Barcode scanners in keyboard mode can
/// feed it directly.
#[derive(Parser, Debug)]
#[command(name = "lending-ledger")]
#[command(about = "A front-desk terminal for borrowing and returning tools", long_about = None)]
struct Args {
    /// CSV of users to register
    ///
    /// Expected format: external_id,first_name,last_name,role,department
    #[arg(long, value_name = "FILE")]
    users: Option<PathBuf>,

    /// CSV of items to register
    ///
    /// Expected format: name,quantity
    #[arg(long, value_name = "FILE")]
    items: Option<PathBuf>,

    /// Write the issued scannable codes to this CSV file
    #[arg(long, value_name = "FILE")]
    codes: Option<PathBuf>,

    /// Write the final ledger to this CSV file
    #[arg(long, value_name = "FILE")]
    ledger: Option<PathBuf>,

    /// Do not run the scheduled overdue sweeper
    #[arg(long)]
    no_sweeper: bool,
}

fn main() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("tracing init failed: {}", e);
    }

    let args = Args::parse();

    let config = LendingConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "invalid configuration, using defaults");
        LendingConfig::default()
    });

    let clock: SharedClock = Arc::new(DefaultClock);
    let registry = Arc::new(Registry::new());
    let ledger = Arc::new(Ledger::new(Arc::clone(&clock)));

    if let Some(path) = &args.users {
        let report = import_users(&registry, open(path)).unwrap_or_else(|e| {
            eprintln!("Error importing users from '{}': {}", path.display(), e);
            process::exit(1);
        });
        info!(created = report.created.len(), failed = report.failed.len(), "users imported");
    }
    if let Some(path) = &args.items {
        let report = import_items(&registry, open(path)).unwrap_or_else(|e| {
            eprintln!("Error importing items from '{}': {}", path.display(), e);
            process::exit(1);
        });
        info!(created = report.created.len(), failed = report.failed.len(), "items imported");
    }

    if let Some(path) = &args.codes {
        if let Err(e) = write_codes(&registry, create(path)) {
            eprintln!("Error writing codes: {}", e);
            process::exit(1);
        }
    }

    let sweeper = if args.no_sweeper {
        None
    } else {
        let sweeper =
            OverdueSweeper::new(Arc::clone(&ledger), Arc::clone(&clock), config.overdue_threshold());
        match sweeper.spawn(config.sweep_interval()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("Error starting overdue sweeper: {}", e);
                process::exit(1);
            }
        }
    };

    let dispatcher = ScanDispatcher::new(registry, ledger);
    let stdin = io::stdin();
    if let Err(e) = process_scans(&dispatcher, stdin.lock(), io::stdout()) {
        eprintln!("Error processing scans: {}", e);
        process::exit(1);
    }

    if let Some(handle) = sweeper {
        handle.shutdown();
    }

    if let Some(path) = &args.ledger {
        if let Err(e) = write_ledger(&dispatcher, create(path)) {
            eprintln!("Error writing ledger: {}", e);
            process::exit(1);
        }
    }
}

fn open(path: &Path) -> BufReader<File> {
    match File::open(path) {
        Ok(f) => BufReader::new(f),
        Err(e) => {
            eprintln!("Error opening file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn create(path: &Path) -> File {
    match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error creating file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// A single scan line.
#[derive(Debug, PartialEq, Eq)]
enum ScanCommand<'a> {
    Toggle { user: &'a str, item: &'a str },
    Borrow { user: &'a str, item: &'a str, count: u32 },
    Return { user: &'a str, item: &'a str, count: u32 },
}

impl<'a> ScanCommand<'a> {
    /// Parses `<user_code> <item_code> [borrow|return [count]]`.
    ///
    /// Returns `None` for malformed lines.
    fn parse(line: &'a str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let user = fields.next()?;
        let item = fields.next()?;
        let action = fields.next();
        let count = match fields.next() {
            Some(raw) => raw.parse().ok()?,
            None => 1,
        };
        if fields.next().is_some() {
            return None;
        }

        match action.map(str::to_lowercase).as_deref() {
            None | Some("scan") => Some(Self::Toggle { user, item }),
            Some("borrow") => Some(Self::Borrow { user, item, count }),
            Some("return") => Some(Self::Return { user, item, count }),
            Some(_) => None,
        }
    }

    fn execute(&self, dispatcher: &ScanDispatcher) -> Result<ScanReceipt, LendingError> {
        match *self {
            Self::Toggle { user, item } => dispatcher.scan_codes(user, item),
            Self::Borrow { user, item, count } => {
                let user = dispatcher.registry().user_by_code(user)?;
                dispatcher.borrow(user.id, item, count)
            }
            Self::Return { user, item, count } => {
                let user = dispatcher.registry().user_by_code(user)?;
                dispatcher.return_item(user.id, item, count)
            }
        }
    }
}

/// Totals for one scan session.
#[derive(Debug, Default, PartialEq, Eq)]
struct ScanSummary {
    accepted: usize,
    rejected: usize,
    malformed: usize,
}

/// Processes scan lines, writing one response line per scan.
///
/// Blank lines and `#` comments are ignored. Rejections are reported to the
/// operator and never stop the session.
///
/// # Errors
///
/// Returns an I/O error if reading input or writing a response fails.
fn process_scans<R: BufRead, W: Write>(
    dispatcher: &ScanDispatcher,
    reader: R,
    mut out: W,
) -> io::Result<ScanSummary> {
    let mut summary = ScanSummary::default();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some(command) = ScanCommand::parse(trimmed) else {
            summary.malformed += 1;
            writeln!(out, "error: cannot parse scan '{}'", trimmed)?;
            continue;
        };

        match command.execute(dispatcher) {
            Ok(receipt) => {
                summary.accepted += 1;
                writeln!(out, "ok: {}", receipt.message)?;
            }
            Err(e) => {
                summary.rejected += 1;
                writeln!(out, "rejected: {}", e)?;
            }
        }
        out.flush()?;
    }

    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "scan session closed"
    );
    Ok(summary)
}

#[derive(Debug, Serialize)]
struct CodeRow<'a> {
    kind: &'static str,
    id: u32,
    name: String,
    code: &'a str,
}

/// Write the issued codes as CSV, users first.
///
/// # CSV Format
///
/// Columns: `kind, id, name, code`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_codes<W: Write>(registry: &Registry, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for user in registry.users() {
        wtr.serialize(CodeRow {
            kind: "user",
            id: user.id.0,
            name: user.full_name(),
            code: user.code.as_str(),
        })?;
    }
    for item in registry.items() {
        wtr.serialize(CodeRow {
            kind: "item",
            id: item.id.0,
            name: item.name.clone(),
            code: item.code.as_str(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write every transaction as CSV, newest first.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_ledger<W: Write>(dispatcher: &ScanDispatcher, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for view in dispatcher.list_all_transactions() {
        wtr.serialize(&view)?;
    }
    wtr.flush()?;
    Ok(())
}
