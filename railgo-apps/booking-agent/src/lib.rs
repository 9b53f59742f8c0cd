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

// Seat-reservation automation engine for Korean rail backends.
// Session login, queue-admission handshake, availability polling, and
// admission-gated reservation writes behind one capability trait.

pub mod backend;
pub mod credential_codec;
pub mod errors;
pub mod gate;
pub mod identity;
mod korail_client;
mod korail_forms;
mod korail_records;
pub mod notice;
pub mod passenger;
pub mod preferences;
pub mod schedule;
mod srt_client;
mod srt_forms;
mod srt_records;
pub mod station;
pub mod watcher;

// Re-export the surface callers actually touch.
pub use railgo_retry_pacer::{abort_pair, AbortHandle, AbortSignal, GammaPacer, PacerError};

pub use backend::{
    backend_now, CardDetails, CardType, RailBackend, RefundKeys, Reservation, SearchQuery,
    Session, Ticket,
};
pub use errors::RailError;
pub use korail_client::{KorailClient, KORAIL_USER_AGENT};
pub use notice::{AbortingOperator, NoticeSink, NullNotice, Operator};
pub use passenger::{combine, total, CardReference, Passenger, PassengerCategory};
pub use preferences::Preferences;
pub use schedule::{
    Schedule, SearchFilter, SeatPreference, SeatState, StandbyState, TrainKey, WindowSeat,
};
pub use srt_client::{SrtClient, SRT_USER_AGENT};
pub use station::{Station, StationCode, StationDirectory};
pub use watcher::{classify, BookingWatcher, Disposition, WatchOutcome, WatchPlan};
