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

//! # Backend Capability Interface
//!
//! The two rail backends expose near-identical operations behind different
//! wire protocols. Everything above the clients (the booking watcher, the
//! CLI) depends only on the `RailBackend` trait and the shared entities in
//! this module.

use std::fmt;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RailError;
use crate::passenger::Passenger;
use crate::schedule::{Schedule, SearchFilter, SeatPreference};
use crate::station::Station;

/// Authenticated conversation state, created by a successful login and
/// owned by exactly one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub membership_number: String,
    pub name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Backend civil time is UTC+9, independent of where the client runs.
pub fn backend_now() -> NaiveDateTime {
    (Utc::now() + ChronoDuration::hours(9)).naive_utc()
}

/// One availability query, replayed unchanged on every watcher iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub departure: Station,
    pub arrival: Station,
    /// `YYYYMMDD`; defaults to today in backend civil time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// `HHMMSS`; defaults to midnight, floored to "now" for today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub passengers: Vec<Passenger>,
    #[serde(default)]
    pub filter: SearchFilter,
}

impl SearchQuery {
    /// Resolve the (date, time) window against backend civil time. Past
    /// dates are rejected; a time in the past today is floored to now so
    /// the backend does not return departed runs.
    pub fn resolve_window(&self) -> Result<(String, String), RailError> {
        let now = backend_now();
        let today = now.format("%Y%m%d").to_string();
        let date = self.date.clone().unwrap_or_else(|| today.clone());
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RailError::InvalidRequest(format!(
                "date must be YYYYMMDD, got {date:?}"
            )));
        }
        if date < today {
            return Err(RailError::InvalidRequest(format!(
                "date {date} is before today {today}"
            )));
        }

        let mut time = self.time.clone().unwrap_or_else(|| "000000".to_string());
        if date == today {
            let now_hms = now.format("%H%M%S").to_string();
            if time < now_hms {
                time = now_hms;
            }
        }
        Ok((date, time))
    }
}

/// Seat-class of a payment card, needed by the pay call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Personal,
    Corporate,
}

impl CardType {
    pub fn wire_code(self) -> &'static str {
        match self {
            CardType::Personal => "J",
            CardType::Corporate => "S",
        }
    }

    /// Heuristic: a six-digit validation value reads as a birth date
    /// (personal card), anything else as a business registration number
    /// (corporate). Ambiguous lengths are not verified against the backend;
    /// callers who know the card type should set it explicitly.
    pub fn infer(validation_value: &str) -> CardType {
        let digits = validation_value.len() == 6
            && validation_value.bytes().all(|b| b.is_ascii_digit());
        if digits {
            CardType::Personal
        } else {
            CardType::Corporate
        }
    }
}

/// Card fields the pay call threads through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    /// Card number without separators.
    pub number: String,
    /// First two digits of the card password.
    pub password_prefix: String,
    /// Birth date (`YYMMDD`) for personal cards, business registration
    /// number for corporate cards.
    pub validation_value: String,
    /// Expiry as `YYMM`.
    pub expiry: String,
    #[serde(default)]
    pub installments: u32,
    /// Explicit card type; when unset the length heuristic decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<CardType>,
}

impl CardDetails {
    pub fn effective_type(&self) -> CardType {
        self.card_type
            .unwrap_or_else(|| CardType::infer(&self.validation_value))
    }
}

/// Sale identifiers carried by an issued ticket, required by the refund
/// write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundKeys {
    pub sale_date: String,
    pub sale_window: String,
    pub sale_sequence: String,
    pub return_password: String,
}

/// Proof of an issued seat, derived read-only from a paid reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub reservation_number: String,
    pub car: String,
    pub seat: String,
    pub seat_class_code: String,
    pub discount_code: String,
    pub discount_name: String,
    pub price: i64,
    pub original_price: i64,
    pub discount_amount: i64,
    /// Set while the ticket belongs to a standby reservation with no seat
    /// assigned yet.
    pub waiting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_keys: Option<RefundKeys>,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.waiting {
            write!(
                f,
                "standby ({}) {} [{} won, {} discounted]",
                seat_class_label(&self.seat_class_code),
                self.discount_name,
                self.price,
                self.discount_amount
            )
        } else {
            write!(
                f,
                "car {} seat {} ({}) {} [{} won, {} discounted]",
                self.car,
                self.seat,
                seat_class_label(&self.seat_class_code),
                self.discount_name,
                self.price,
                self.discount_amount
            )
        }
    }
}

pub fn seat_class_label(code: &str) -> &'static str {
    match code {
        "2" => "special",
        _ => "general",
    }
}

/// Server-side reservation resource, re-fetched canonically after every
/// write that touches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_number: String,
    pub total_price: i64,
    pub seat_count: u32,

    pub train_class_code: String,
    pub train_class_name: String,
    pub train_number: String,

    pub dep_date: String,
    pub dep_time: String,
    pub dep_station_code: String,
    pub dep_station_name: String,
    pub arr_time: String,
    pub arr_station_code: String,
    pub arr_station_name: String,

    pub payment_due_date: String,
    pub payment_due_time: String,
    pub paid: bool,
    /// Standby reservation with no confirmed seat yet.
    pub waiting: bool,

    // Second-backend bookkeeping echoed back by cancel/pay forms.
    #[serde(default)]
    pub journey_number: String,
    #[serde(default)]
    pub journey_count: String,
    #[serde(default)]
    pub change_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_window: Option<String>,

    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hhmm = |t: &str| {
            if t.len() >= 4 {
                format!("{}:{}", &t[..2], &t[2..4])
            } else {
                t.to_string()
            }
        };
        write!(
            f,
            "[{}] {} {}~{} ({}~{}) {} won ({} seats)",
            self.train_class_name,
            self.dep_date,
            self.dep_station_name,
            self.arr_station_name,
            hhmm(&self.dep_time),
            hhmm(&self.arr_time),
            self.total_price,
            self.seat_count
        )?;
        if !self.paid {
            if self.waiting {
                write!(f, ", standby")?;
            } else {
                write!(
                    f,
                    ", pay by {} {}",
                    self.payment_due_date,
                    hhmm(&self.payment_due_time)
                )?;
            }
        }
        Ok(())
    }
}

/// The capability surface shared by both rail backends. One instance owns
/// one session and one admission-token cache; it is never shared across
/// concurrent operations.
#[allow(async_fn_in_trait)]
pub trait RailBackend {
    fn session(&self) -> Option<&Session>;

    fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    async fn login(&mut self, identifier: &str, credential: &str) -> Result<Session, RailError>;

    async fn logout(&mut self) -> Result<(), RailError>;

    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Schedule>, RailError>;

    async fn reserve(
        &mut self,
        schedule: &Schedule,
        passengers: &[Passenger],
        preference: SeatPreference,
    ) -> Result<Reservation, RailError>;

    async fn reserve_standby(
        &mut self,
        schedule: &Schedule,
        passengers: &[Passenger],
        preference: SeatPreference,
    ) -> Result<Reservation, RailError>;

    async fn reservations(&mut self) -> Result<Vec<Reservation>, RailError>;

    async fn tickets(&mut self) -> Result<Vec<Ticket>, RailError>;

    async fn cancel(&mut self, reservation: &Reservation) -> Result<(), RailError>;

    async fn pay(&mut self, reservation: &Reservation, card: &CardDetails)
        -> Result<bool, RailError>;

    async fn refund(&mut self, ticket: &Ticket) -> Result<(), RailError>;

    fn clear_admission_cache(&mut self);
}
