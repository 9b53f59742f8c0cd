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

//! # Korail Session Client
//!
//! Effectful operations against the Korail mobile endpoints. This is the
//! backend whose login wire format requires the credential codec: a
//! pre-login handshake negotiates an AES key, and the login form carries the
//! encrypted credential plus the key's server-side index.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use wreq::header::{HeaderMap, HeaderValue};
use wreq::redirect::Policy;
use wreq_util::Emulation;

use crate::backend::{CardDetails, RailBackend, Reservation, SearchQuery, Session, Ticket};
use crate::credential_codec::encrypt_credential;
use crate::errors::RailError;
use crate::gate::{AdmissionGate, GateProfile, HttpGateTransport};
use crate::identity::{normalize_identifier, LoginMethod};
use crate::korail_forms::{self as forms, Form};
use crate::korail_records as records;
use crate::notice::{NoticeSink, NullNotice};
use crate::passenger::{self, Passenger};
use crate::schedule::{Schedule, SeatPreference};

/// The Android app's user agent.
pub const KORAIL_USER_AGENT: &str =
    "Dalvik/2.1.0 (Linux; U; Android 14; SM-S911U1 Build/UP1A.231005.007)";

pub struct KorailClient {
    http: wreq::Client,
    gate: AdmissionGate<HttpGateTransport>,
    notice: Arc<dyn NoticeSink>,
    session: Option<Session>,
}

impl KorailClient {
    pub fn new() -> Result<Self, RailError> {
        let mut headers = HeaderMap::new();
        headers.insert("User-Agent", HeaderValue::from_static(KORAIL_USER_AGENT));

        let http = wreq::Client::builder()
            .emulation(Emulation::Chrome131)
            .default_headers(headers)
            .cookie_store(true)
            .redirect(Policy::default())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RailError::Network)?;

        Ok(KorailClient {
            http,
            gate: AdmissionGate::new(GateProfile::korail(), KORAIL_USER_AGENT)?,
            notice: Arc::new(NullNotice),
            session: None,
        })
    }

    pub fn with_notice(mut self, notice: Arc<dyn NoticeSink>) -> Self {
        self.notice = notice;
        self
    }

    fn require_session(&self) -> Result<&Session, RailError> {
        self.session.as_ref().ok_or(RailError::NotLoggedIn)
    }

    async fn get_raw(&self, url: &str, form: &Form) -> Result<String, RailError> {
        tracing::debug!(%url, "request");
        let response = self
            .http
            .get(url)
            .query(form)
            .send()
            .await
            .map_err(RailError::Network)?;
        let body = response.text().await.map_err(RailError::Network)?;
        tracing::trace!(bytes = body.len(), "response");
        Ok(body)
    }

    async fn post_raw(&self, url: &str, form: &Form) -> Result<String, RailError> {
        tracing::debug!(%url, "request");
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(RailError::Network)?;
        let body = response.text().await.map_err(RailError::Network)?;
        tracing::trace!(bytes = body.len(), "response");
        Ok(body)
    }

    /// GET + envelope check; the read endpoints take their form as a query
    /// string.
    async fn get_checked(&self, url: &str, form: &Form) -> Result<Value, RailError> {
        let body = self.get_raw(url, form).await?;
        let root = records::parse_root(&body)?;
        records::check_result(&root)?;
        Ok(root)
    }

    async fn post_checked(&self, url: &str, form: &Form) -> Result<Value, RailError> {
        let body = self.post_raw(url, form).await?;
        let root = records::parse_root(&body)?;
        records::check_result(&root)?;
        Ok(root)
    }

    /// Negotiate the AES key for the credential codec.
    async fn fetch_cipher_key(&self) -> Result<(String, String), RailError> {
        let body = self
            .post_raw(&forms::endpoints::cipher_key(), &forms::cipher_key_form())
            .await?;
        records::parse_cipher_key(&body)
    }

    async fn fetch_reservations(&self) -> Result<Vec<Reservation>, RailError> {
        let root = match self
            .get_checked(
                &forms::endpoints::reservation_list(),
                &forms::reservation_list_form(),
            )
            .await
        {
            Ok(root) => root,
            // An empty list is reported through the no-results code.
            Err(RailError::NoResults) => return Ok(Vec::new()),
            Err(other) => return Err(other),
        };
        records::reservations_from(&root)
    }

    async fn submit_reserve(
        &mut self,
        schedule: &Schedule,
        passengers: &[Passenger],
        special_seat: bool,
        standby: bool,
    ) -> Result<Reservation, RailError> {
        let token = self.gate.run(self.notice.as_ref()).await?;
        let form = forms::reserve_form(schedule, passengers, special_seat, standby, &token);
        let root = self
            .get_checked(&forms::endpoints::reserve(), &form)
            .await?;
        let (number, sales_window) = records::reserve_reply(&root)?;
        tracing::info!(reservation = %number, "reservation accepted, fetching canonical record");

        for mut reservation in self.fetch_reservations().await? {
            if reservation.reservation_number == number {
                reservation.sales_window = sales_window.clone();
                return Ok(reservation);
            }
        }
        Err(RailError::ReservationNotFound(number))
    }
}

impl RailBackend for KorailClient {
    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn login(&mut self, identifier: &str, credential: &str) -> Result<Session, RailError> {
        let method = LoginMethod::classify(identifier);
        let normalized = normalize_identifier(identifier, method);

        let (key_index, key) = self.fetch_cipher_key().await?;
        let encrypted = encrypt_credential(credential, &key)?;

        let form = forms::login_form(method, &normalized, &encrypted, &key_index);
        let body = self.post_raw(&forms::endpoints::login(), &form).await?;
        let session = records::parse_login(&body)?;
        tracing::info!(member = %session.name, "logged in");
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn logout(&mut self) -> Result<(), RailError> {
        if self.session.is_none() {
            return Ok(());
        }
        self.http
            .get(forms::endpoints::logout())
            .send()
            .await
            .map_err(RailError::Network)?;
        self.session = None;
        Ok(())
    }

    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Schedule>, RailError> {
        let passengers = passenger::prepare(&query.passengers)?;
        let (date, time) = query.resolve_window()?;
        let membership = self
            .session
            .as_ref()
            .map(|s| s.membership_number.clone())
            .unwrap_or_default();

        let form = forms::search_form(
            &query.departure.name,
            &query.arrival.name,
            &date,
            &time,
            &passengers,
            &membership,
        );
        let root = self
            .get_checked(&forms::endpoints::search_schedule(), &form)
            .await?;
        let schedules: Vec<Schedule> = records::schedules_from(&root)?
            .into_iter()
            .filter(|s| query.filter.accepts(s))
            .collect();
        if schedules.is_empty() {
            return Err(RailError::NoResults);
        }
        Ok(schedules)
    }

    async fn reserve(
        &mut self,
        schedule: &Schedule,
        passengers: &[Passenger],
        preference: SeatPreference,
    ) -> Result<Reservation, RailError> {
        self.require_session()?;
        let passengers = passenger::prepare(passengers)?;

        // A sold-out run with an open standby lane becomes a standby write;
        // without one the personal write goes out and loses its race.
        let reserving_seat = schedule.seat_available() || schedule.standby.not_applicable();
        let special_seat = if reserving_seat {
            preference.wants_special_seat(schedule)
        } else {
            preference.wants_special_standby()
        };
        self.submit_reserve(schedule, &passengers, special_seat, !reserving_seat)
            .await
    }

    async fn reserve_standby(
        &mut self,
        schedule: &Schedule,
        passengers: &[Passenger],
        preference: SeatPreference,
    ) -> Result<Reservation, RailError> {
        self.require_session()?;
        let passengers = passenger::prepare(passengers)?;
        let narrowed = preference.narrowed_for_standby();
        self.submit_reserve(
            schedule,
            &passengers,
            narrowed.wants_special_standby(),
            true,
        )
        .await
    }

    async fn reservations(&mut self) -> Result<Vec<Reservation>, RailError> {
        self.require_session()?;
        self.fetch_reservations().await
    }

    async fn tickets(&mut self) -> Result<Vec<Ticket>, RailError> {
        self.require_session()?;
        let root = match self
            .get_checked(&forms::endpoints::ticket_list(), &forms::ticket_list_form())
            .await
        {
            Ok(root) => root,
            Err(RailError::NoResults) => return Ok(Vec::new()),
            Err(other) => return Err(other),
        };

        let mut tickets = records::tickets_from(&root)?;
        // The list omits the seat id; a per-ticket lookup fills it in.
        for ticket in &mut tickets {
            if let Some(keys) = &ticket.refund_keys {
                let seat_root = self
                    .get_checked(&forms::endpoints::ticket_seat(), &forms::ticket_seat_form(keys))
                    .await?;
                if let Some(seat) = records::seat_from(&seat_root) {
                    ticket.seat = seat;
                    ticket.waiting = false;
                }
            }
        }
        Ok(tickets)
    }

    async fn cancel(&mut self, reservation: &Reservation) -> Result<(), RailError> {
        self.require_session()?;
        self.gate.run(self.notice.as_ref()).await?;
        self.post_checked(&forms::endpoints::cancel(), &forms::cancel_form(reservation))
            .await?;
        Ok(())
    }

    async fn pay(
        &mut self,
        reservation: &Reservation,
        card: &CardDetails,
    ) -> Result<bool, RailError> {
        self.require_session()?;
        self.gate.run(self.notice.as_ref()).await?;
        let form = forms::pay_form(reservation, card)?;
        self.post_checked(&forms::endpoints::pay(), &form).await?;
        Ok(true)
    }

    async fn refund(&mut self, ticket: &Ticket) -> Result<(), RailError> {
        self.require_session()?;
        self.gate.run(self.notice.as_ref()).await?;
        let form = forms::refund_form(ticket)?;
        self.post_checked(&forms::endpoints::refund(), &form).await?;
        Ok(())
    }

    fn clear_admission_cache(&mut self) {
        self.gate.clear();
    }
}
