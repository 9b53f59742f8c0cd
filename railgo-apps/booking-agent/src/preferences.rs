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

//! # Operator Preferences
//!
//! Defaults the engine consumes at construction: stations, travel window,
//! passenger counts, seat policy. The file format is JSON; where it lives
//! and how it is edited is the caller's concern.

use serde::{Deserialize, Serialize};

use crate::errors::RailError;
use crate::passenger::{Passenger, PassengerCategory};
use crate::schedule::{SearchFilter, SeatPreference};
use crate::station::Station;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub departure: Option<String>,
    pub arrival: Option<String>,
    /// `YYYYMMDD`
    pub date: Option<String>,
    /// `HHMMSS`
    pub time: Option<String>,
    pub adults: u32,
    pub children: u32,
    pub seniors: u32,
    pub seat_preference: SeatPreference,
    pub include_standby: bool,
    /// Station directory entries, name + 4-digit code.
    pub stations: Vec<Station>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            departure: None,
            arrival: None,
            date: None,
            time: None,
            adults: 1,
            children: 0,
            seniors: 0,
            seat_preference: SeatPreference::GeneralFirst,
            include_standby: false,
            stations: Vec::new(),
        }
    }
}

impl Preferences {
    pub fn from_json(text: &str) -> Result<Self, RailError> {
        serde_json::from_str(text)
            .map_err(|e| RailError::InvalidRequest(format!("preferences file: {e}")))
    }

    pub fn passengers(&self) -> Vec<Passenger> {
        let mut passengers = Vec::new();
        if self.adults > 0 {
            passengers.push(Passenger::adult(self.adults));
        }
        if self.children > 0 {
            passengers.push(Passenger::new(PassengerCategory::Child, self.children));
        }
        if self.seniors > 0 {
            passengers.push(Passenger::new(PassengerCategory::Senior, self.seniors));
        }
        passengers
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            include_no_seat: self.include_standby,
            include_standby: self.include_standby,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let prefs = Preferences::from_json("{}").expect("parses");
        assert_eq!(prefs.adults, 1);
        assert_eq!(prefs.seat_preference, SeatPreference::GeneralFirst);
        assert!(prefs.passengers().len() == 1);
    }

    #[test]
    fn counts_become_line_items() {
        let prefs = Preferences::from_json(r#"{ "adults": 2, "seniors": 1 }"#).expect("parses");
        let passengers = prefs.passengers();
        assert_eq!(passengers.len(), 2);
        assert_eq!(crate::passenger::total(&passengers), 3);
    }

    #[test]
    fn malformed_json_is_an_invalid_request() {
        assert!(matches!(
            Preferences::from_json("{ adults: }"),
            Err(RailError::InvalidRequest(_))
        ));
    }
}
