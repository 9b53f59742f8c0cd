//!  Railgo Booking Agent
//!
//!  Copyright (C) 2026  Railgo Contributors
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Stations
//!
//! The authoritative station list lives outside the engine; callers supply
//! the stations they care about as (name, code) pairs. The engine validates
//! code shape and resolves codes back to display names when the backend
//! returns codes only.

use serde::{Deserialize, Serialize};

use crate::errors::RailError;

/// Four-digit station code as used on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationCode(String);

impl StationCode {
    pub fn new(code: impl Into<String>) -> Result<Self, RailError> {
        let code = code.into();
        if code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(StationCode(code))
        } else {
            Err(RailError::Protocol(format!(
                "station code must be 4 digits, got {code:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A station as the operator names it plus its wire code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub code: StationCode,
}

impl Station {
    pub fn new(name: impl Into<String>, code: StationCode) -> Self {
        Station {
            name: name.into(),
            code,
        }
    }
}

/// Lookup over the caller-supplied station set. Unknown codes resolve to the
/// code digits themselves so display never fails on an unlisted station.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    entries: Vec<Station>,
}

impl StationDirectory {
    pub fn new(entries: Vec<Station>) -> Self {
        StationDirectory { entries }
    }

    pub fn name_of(&self, code: &str) -> String {
        self.entries
            .iter()
            .find(|s| s.code.as_str() == code)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Station> {
        self.entries.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_four_digit_codes() {
        assert!(StationCode::new("0551").is_ok());
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(StationCode::new("551").is_err());
        assert!(StationCode::new("05 1").is_err());
        assert!(StationCode::new("055a").is_err());
        assert!(StationCode::new("00551").is_err());
    }

    #[test]
    fn directory_falls_back_to_code_digits() {
        let dir = StationDirectory::new(vec![Station::new(
            "Suseo",
            StationCode::new("0551").expect("valid"),
        )]);
        assert_eq!(dir.name_of("0551"), "Suseo");
        assert_eq!(dir.name_of("0020"), "0020");
    }
}
