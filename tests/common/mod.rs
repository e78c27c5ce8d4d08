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

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use lending_ledger_rs::{
    Item, Ledger, NewItem, NewUser, OverdueSweeper, Registry, ScanDispatcher, User, UserRole,
};
use mockable::Clock;
use parking_lot::Mutex;
use std::sync::Arc;

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()),
        })
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A registry, ledger, dispatcher and sweeper sharing one manual clock.
pub struct Desk {
    pub clock: Arc<ManualClock>,
    pub registry: Arc<Registry>,
    pub ledger: Arc<Ledger>,
    pub dispatcher: Arc<ScanDispatcher>,
    pub sweeper: OverdueSweeper,
}

impl Desk {
    pub fn new() -> Self {
        let clock = ManualClock::new();
        let registry = Arc::new(Registry::new());
        let ledger = Arc::new(Ledger::new(clock.clone()));
        let dispatcher = Arc::new(ScanDispatcher::new(registry.clone(), ledger.clone()));
        let sweeper = OverdueSweeper::new(ledger.clone(), clock.clone(), TimeDelta::hours(24));
        Self {
            clock,
            registry,
            ledger,
            dispatcher,
            sweeper,
        }
    }

    pub fn user(&self, external_id: &str) -> User {
        self.registry
            .register_user(NewUser {
                external_id: external_id.to_owned(),
                first_name: "User".to_owned(),
                last_name: external_id.to_owned(),
                role: UserRole::Student,
                department: "Workshop".to_owned(),
            })
            .unwrap()
    }

    pub fn item(&self, name: &str, quantity: u32) -> Item {
        self.registry
            .register_item(NewItem::new(name, quantity))
            .unwrap()
    }

    pub fn active(&self, item: &Item) -> usize {
        self.ledger.count_active_borrows(item.id)
    }
}
