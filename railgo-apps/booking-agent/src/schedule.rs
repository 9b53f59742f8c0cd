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

//! # Schedules and Seat Preferences
//!
//! A `Schedule` is an immutable snapshot of one train run as a single search
//! response reported it. Snapshots are produced fresh on every search and
//! never mutated; availability decisions always re-read a fresh snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Availability of one seat class in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatState {
    Available,
    Unavailable,
}

impl SeatState {
    pub fn is_available(self) -> bool {
        matches!(self, SeatState::Available)
    }
}

/// Standby-queue state, a signed wire code: negative = standby not
/// applicable to this run, 0 = standby sold out, positive = standby open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandbyState(pub i32);

impl StandbyState {
    pub fn not_applicable(self) -> bool {
        self.0 < 0
    }

    pub fn sold_out(self) -> bool {
        self.0 == 0
    }

    pub fn open(self) -> bool {
        self.0 > 0
    }
}

/// One train run: route, identity, and the seat-state flags from the search
/// response that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub train_class_code: String,
    pub train_class_name: String,
    pub train_number: String,

    pub dep_station_code: String,
    pub dep_station_name: String,
    pub dep_date: String,
    pub dep_time: String,

    pub arr_station_code: String,
    pub arr_station_name: String,
    pub arr_time: String,

    pub run_date: String,

    // Consist bookkeeping the first backend's reserve form echoes back.
    #[serde(default)]
    pub dep_run_order: String,
    #[serde(default)]
    pub dep_cons_order: String,
    #[serde(default)]
    pub arr_run_order: String,
    #[serde(default)]
    pub arr_cons_order: String,

    pub general_seat: SeatState,
    pub special_seat: SeatState,
    pub standby: StandbyState,
}

impl Schedule {
    pub fn general_seat_available(&self) -> bool {
        self.general_seat.is_available()
    }

    pub fn special_seat_available(&self) -> bool {
        self.special_seat.is_available()
    }

    pub fn seat_available(&self) -> bool {
        self.general_seat_available() || self.special_seat_available()
    }

    pub fn standby_available(&self) -> bool {
        self.standby.open()
    }

    /// Stable identity of the run across eventually-consistent search
    /// results, which may reorder between polls.
    pub fn key(&self) -> TrainKey {
        TrainKey {
            train_number: self.train_number.clone(),
            dep_time: self.dep_time.clone(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hhmm = |t: &str| {
            if t.len() >= 4 {
                format!("{}:{}", &t[..2], &t[2..4])
            } else {
                t.to_string()
            }
        };
        let date = if self.dep_date.len() == 8 {
            format!("{}-{}", &self.dep_date[4..6], &self.dep_date[6..8])
        } else {
            self.dep_date.clone()
        };
        write!(
            f,
            "[{} {}] {} {}~{} ({}~{}) special {:?}, general {:?}",
            self.train_class_name,
            self.train_number,
            date,
            self.dep_station_name,
            self.arr_station_name,
            hhmm(&self.dep_time),
            hhmm(&self.arr_time),
            self.special_seat,
            self.general_seat,
        )?;
        if !self.standby.not_applicable() {
            write!(
                f,
                ", standby {}",
                if self.standby.open() { "open" } else { "sold out" }
            )?;
        }
        Ok(())
    }
}

/// Identity a watcher uses to re-find a chosen run in later search results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainKey {
    pub train_number: String,
    pub dep_time: String,
}

/// Operator policy for choosing between general and special seating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatPreference {
    GeneralFirst,
    GeneralOnly,
    SpecialFirst,
    SpecialOnly,
}

impl SeatPreference {
    /// Whether a snapshot satisfies this preference: the "-first" forms
    /// accept either class, the "-only" forms exactly one.
    pub fn matches(self, schedule: &Schedule) -> bool {
        match self {
            SeatPreference::GeneralFirst | SeatPreference::SpecialFirst => {
                schedule.seat_available()
            }
            SeatPreference::GeneralOnly => schedule.general_seat_available(),
            SeatPreference::SpecialOnly => schedule.special_seat_available(),
        }
    }

    /// Seat class to submit when seats are on open sale. The "-first" forms
    /// fall through to the other class when their preferred one is gone.
    pub fn wants_special_seat(self, schedule: &Schedule) -> bool {
        match self {
            SeatPreference::GeneralOnly => false,
            SeatPreference::SpecialOnly => true,
            SeatPreference::GeneralFirst => !schedule.general_seat_available(),
            SeatPreference::SpecialFirst => schedule.special_seat_available(),
        }
    }

    /// Seat class to submit on a standby request, where no fallback exists.
    pub fn wants_special_standby(self) -> bool {
        matches!(
            self,
            SeatPreference::SpecialFirst | SeatPreference::SpecialOnly
        )
    }

    /// Standby submissions only accept the "-only" forms.
    pub fn narrowed_for_standby(self) -> SeatPreference {
        match self {
            SeatPreference::GeneralFirst | SeatPreference::GeneralOnly => {
                SeatPreference::GeneralOnly
            }
            SeatPreference::SpecialFirst | SeatPreference::SpecialOnly => {
                SeatPreference::SpecialOnly
            }
        }
    }
}

/// Window/aisle attribute on the first backend's reserve form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSeat {
    Window,
    Aisle,
}

pub fn window_seat_code(pref: Option<WindowSeat>) -> &'static str {
    match pref {
        None => "000",
        Some(WindowSeat::Window) => "012",
        Some(WindowSeat::Aisle) => "013",
    }
}

/// Composable availability filter over search results. The base predicate
/// keeps runs with an open seat; the optional predicates widen the set and
/// are OR-combined with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub include_no_seat: bool,
    pub include_standby: bool,
}

impl SearchFilter {
    pub fn available_only() -> Self {
        SearchFilter::default()
    }

    pub fn everything() -> Self {
        SearchFilter {
            include_no_seat: true,
            include_standby: true,
        }
    }

    pub fn accepts(&self, schedule: &Schedule) -> bool {
        schedule.seat_available()
            || (self.include_no_seat && !schedule.seat_available())
            || (self.include_standby && schedule.standby_available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(general: SeatState, special: SeatState, standby: i32) -> Schedule {
        Schedule {
            train_class_code: "17".into(),
            train_class_name: "SRT".into(),
            train_number: "0301".into(),
            dep_station_code: "0551".into(),
            dep_station_name: "Suseo".into(),
            dep_date: "20260815".into(),
            dep_time: "080000".into(),
            arr_station_code: "0020".into(),
            arr_station_name: "Busan".into(),
            arr_time: "103000".into(),
            run_date: "20260815".into(),
            dep_run_order: "1".into(),
            dep_cons_order: "1".into(),
            arr_run_order: "9".into(),
            arr_cons_order: "9".into(),
            general_seat: general,
            special_seat: special,
            standby: StandbyState(standby),
        }
    }

    #[test]
    fn standby_code_semantics() {
        assert!(StandbyState(-1).not_applicable());
        assert!(StandbyState(-2).not_applicable());
        assert!(StandbyState(0).sold_out());
        assert!(StandbyState(9).open());
        assert!(!StandbyState(0).open());
    }

    #[test]
    fn filter_base_keeps_available_runs_only() {
        let filter = SearchFilter::available_only();
        assert!(filter.accepts(&snapshot(SeatState::Available, SeatState::Unavailable, -1)));
        assert!(!filter.accepts(&snapshot(SeatState::Unavailable, SeatState::Unavailable, -1)));
    }

    #[test]
    fn filter_predicates_are_or_combined() {
        let sold_out_with_standby = snapshot(SeatState::Unavailable, SeatState::Unavailable, 9);
        let standby_only = SearchFilter {
            include_no_seat: false,
            include_standby: true,
        };
        assert!(standby_only.accepts(&sold_out_with_standby));

        let sold_out_no_standby = snapshot(SeatState::Unavailable, SeatState::Unavailable, 0);
        assert!(!standby_only.accepts(&sold_out_no_standby));
        assert!(SearchFilter::everything().accepts(&sold_out_no_standby));
    }

    #[test]
    fn standby_narrowing_keeps_class_side() {
        assert_eq!(
            SeatPreference::GeneralFirst.narrowed_for_standby(),
            SeatPreference::GeneralOnly
        );
        assert_eq!(
            SeatPreference::SpecialFirst.narrowed_for_standby(),
            SeatPreference::SpecialOnly
        );
    }

    #[test]
    fn display_marks_standby_when_applicable() {
        let shown = snapshot(SeatState::Available, SeatState::Unavailable, 9).to_string();
        assert!(shown.contains("standby open"));
        let hidden = snapshot(SeatState::Available, SeatState::Unavailable, -1).to_string();
        assert!(!hidden.contains("standby"));
    }
}
