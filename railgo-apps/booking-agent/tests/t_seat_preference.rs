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

//! Exhaustive seat-preference semantics: every preference against every
//! seat-state combination, plus the seat-class resolution the write path
//! submits.
//!
//! Run with:
//!     cargo test --test t_seat_preference

use railgo_booking_agent::{Schedule, SeatPreference, SeatState, StandbyState};

fn snapshot(general_free: bool, special_free: bool) -> Schedule {
    let state = |free: bool| {
        if free {
            SeatState::Available
        } else {
            SeatState::Unavailable
        }
    };
    Schedule {
        train_class_code: "17".into(),
        train_class_name: "SRT".into(),
        train_number: "0301".into(),
        dep_station_code: "0551".into(),
        dep_station_name: "수서".into(),
        dep_date: "20260815".into(),
        dep_time: "080000".into(),
        arr_station_code: "0020".into(),
        arr_station_name: "부산".into(),
        arr_time: "103000".into(),
        run_date: "20260815".into(),
        dep_run_order: "1".into(),
        dep_cons_order: "1".into(),
        arr_run_order: "9".into(),
        arr_cons_order: "9".into(),
        general_seat: state(general_free),
        special_seat: state(special_free),
        standby: StandbyState(-1),
    }
}

#[test]
fn preference_match_table_is_exhaustive() {
    use SeatPreference::*;

    // (general free, special free) -> expected match per preference.
    let table: [(bool, bool, [bool; 4]); 4] = [
        // general_first, general_only, special_first, special_only
        (true, false, [true, true, true, false]),
        (false, true, [true, false, true, true]),
        (false, false, [false, false, false, false]),
        (true, true, [true, true, true, true]),
    ];

    for (general, special, expected) in table {
        let schedule = snapshot(general, special);
        let actual = [
            GeneralFirst.matches(&schedule),
            GeneralOnly.matches(&schedule),
            SpecialFirst.matches(&schedule),
            SpecialOnly.matches(&schedule),
        ];
        assert_eq!(
            actual, expected,
            "mismatch for general_free={general}, special_free={special}"
        );
    }
}

#[test]
fn first_preferences_fall_through_to_the_open_class() {
    // Only the special class is open: general-first falls through to it.
    let special_only_open = snapshot(false, true);
    assert!(SeatPreference::GeneralFirst.wants_special_seat(&special_only_open));
    assert!(SeatPreference::SpecialFirst.wants_special_seat(&special_only_open));

    // Only the general class is open: special-first falls back to general.
    let general_only_open = snapshot(true, false);
    assert!(!SeatPreference::SpecialFirst.wants_special_seat(&general_only_open));
    assert!(!SeatPreference::GeneralFirst.wants_special_seat(&general_only_open));
}

#[test]
fn only_preferences_never_switch_class() {
    for (general, special) in [(true, true), (true, false), (false, true), (false, false)] {
        let schedule = snapshot(general, special);
        assert!(!SeatPreference::GeneralOnly.wants_special_seat(&schedule));
        assert!(SeatPreference::SpecialOnly.wants_special_seat(&schedule));
    }
}

#[test]
fn standby_class_follows_the_preference_side() {
    assert!(!SeatPreference::GeneralFirst.wants_special_standby());
    assert!(!SeatPreference::GeneralOnly.wants_special_standby());
    assert!(SeatPreference::SpecialFirst.wants_special_standby());
    assert!(SeatPreference::SpecialOnly.wants_special_standby());
}
