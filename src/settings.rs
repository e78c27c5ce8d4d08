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

//! Runtime settings.
//!
//! Read from `config/lending.toml` (optional) and then from environment
//! variables prefixed with `LENDING__`, e.g. `LENDING__OVERDUE_AFTER_HOURS=48`.

use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LendingConfig {
    /// Hours a borrow may stay open before the sweeper marks it unreturned.
    #[serde(default = "default_overdue_after_hours")]
    pub overdue_after_hours: u32,
    /// Seconds between scheduled sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_overdue_after_hours() -> u32 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    3600 // hourly
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            overdue_after_hours: default_overdue_after_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl LendingConfig {
    pub const DEFAULT_FILE: &'static str = "config/lending.toml";

    /// Loads settings from [`Self::DEFAULT_FILE`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::DEFAULT_FILE)
    }

    /// Loads settings from `path` (missing file is fine) and the environment.
    ///
    /// Environment variables take precedence over the file.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or mistyped values, and on a zero sweep interval.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Self::build(path, None)
    }

    /// `env` replaces the process environment when given.
    fn build(path: &str, env: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("LENDING")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "sweep_interval_secs must be at least 1".to_owned(),
            ));
        }
        Ok(self)
    }

    pub fn overdue_threshold(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.overdue_after_hours))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn defaults_match_hourly_sweep_of_day_old_borrows() {
        let config = LendingConfig::default();
        assert_eq!(config.overdue_threshold(), TimeDelta::hours(24));
        assert_eq!(config.sweep_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = LendingConfig::build("config/does-not-exist.toml", Some(Map::new())).unwrap();
        assert_eq!(config, LendingConfig::default());
    }

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("lending-{}-{}.toml", name, std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn file_overrides_defaults() {
        let path = write_temp("file", "overdue_after_hours = 48\n");

        let config = LendingConfig::build(path.to_str().unwrap(), Some(Map::new())).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.overdue_after_hours, 48);
        assert_eq!(config.sweep_interval_secs, 3600);
    }

    #[test]
    fn environment_overrides_file() {
        let path = write_temp("env", "overdue_after_hours = 48\nsweep_interval_secs = 60\n");
        let env = Map::from([(
            "LENDING__OVERDUE_AFTER_HOURS".to_owned(),
            "72".to_owned(),
        )]);

        let config = LendingConfig::build(path.to_str().unwrap(), Some(env)).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.overdue_after_hours, 72);
        assert_eq!(config.sweep_interval_secs, 60);
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let path = write_temp("zero", "sweep_interval_secs = 0\n");

        let result = LendingConfig::build(path.to_str().unwrap(), Some(Map::new()));
        fs::remove_file(&path).unwrap();

        assert!(result.is_err());

        let env = Map::from([("LENDING__SWEEP_INTERVAL_SECS".to_owned(), "0".to_owned())]);
        assert!(LendingConfig::build("config/does-not-exist.toml", Some(env)).is_err());
    }
}
