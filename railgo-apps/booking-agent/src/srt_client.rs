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

//! # SRT Session Client
//!
//! Effectful (time, network) operations against the SRT mobile endpoints.
//! One instance owns one authenticated session and one admission-token
//! cache; pure form building and response decoding live in `srt_forms` and
//! `srt_records`.

use std::sync::Arc;
use std::time::Duration;

use wreq::header::{HeaderMap, HeaderValue};
use wreq::redirect::Policy;
use wreq_util::Emulation;

use crate::backend::{
    backend_now, CardDetails, RailBackend, Reservation, SearchQuery, Session, Ticket,
};
use crate::errors::RailError;
use crate::gate::{AdmissionGate, GateProfile, HttpGateTransport};
use crate::identity::{normalize_identifier, LoginMethod};
use crate::notice::{NoticeSink, NullNotice};
use crate::passenger::{self, Passenger};
use crate::schedule::{Schedule, SeatPreference, WindowSeat};
use crate::srt_forms::{self as forms, Form, ReserveJob};
use crate::srt_records as records;
use crate::station::StationDirectory;

/// The mobile app's user agent; the endpoints reject unknown clients.
pub const SRT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 14; SM-S911U1 Build/UP1A.231005.007; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/131.0.6778.135 Mobile Safari/537.36SRT-APP-Android V.2.0.32";

pub struct SrtClient {
    http: wreq::Client,
    gate: AdmissionGate<HttpGateTransport>,
    stations: StationDirectory,
    notice: Arc<dyn NoticeSink>,
    session: Option<Session>,
    window_preference: Option<WindowSeat>,
}

impl SrtClient {
    pub fn new(stations: StationDirectory) -> Result<Self, RailError> {
        let mut headers = HeaderMap::new();
        headers.insert("User-Agent", HeaderValue::from_static(SRT_USER_AGENT));
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let http = wreq::Client::builder()
            .emulation(Emulation::Chrome131)
            .default_headers(headers)
            .cookie_store(true)
            .redirect(Policy::default())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RailError::Network)?;

        Ok(SrtClient {
            http,
            gate: AdmissionGate::new(GateProfile::srt(), SRT_USER_AGENT)?,
            stations,
            notice: Arc::new(NullNotice),
            session: None,
            window_preference: None,
        })
    }

    pub fn with_notice(mut self, notice: Arc<dyn NoticeSink>) -> Self {
        self.notice = notice;
        self
    }

    /// Window/aisle attribute submitted with personal reservations.
    pub fn set_window_preference(&mut self, preference: Option<WindowSeat>) {
        self.window_preference = preference;
    }

    fn require_session(&self) -> Result<&Session, RailError> {
        self.session.as_ref().ok_or(RailError::NotLoggedIn)
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

    /// Execute one call and decode the generic success/fail envelope.
    async fn execute(&self, url: &str, form: &Form) -> Result<records::SrtEnvelope, RailError> {
        let body = self.post_raw(url, form).await?;
        let envelope = records::SrtEnvelope::parse(&body)?;
        envelope.ensure_success()?;
        Ok(envelope)
    }

    async fn submit_reserve(
        &mut self,
        job: ReserveJob,
        schedule: &Schedule,
        passengers: &[Passenger],
        special_seat: bool,
    ) -> Result<Reservation, RailError> {
        let phone = self
            .session
            .as_ref()
            .map(|s| s.phone_number.clone())
            .unwrap_or_default();
        let token = self.gate.run(self.notice.as_ref()).await?;
        let window = if job == ReserveJob::Personal {
            self.window_preference
        } else {
            None
        };
        let form = forms::reserve_form(
            job,
            schedule,
            passengers,
            special_seat,
            window,
            if phone.is_empty() { None } else { Some(&phone) },
            &token,
        )?;
        let envelope = self.execute(&forms::endpoints::reserve(), &form).await?;
        let number = records::reservation_number_from(&envelope)?;
        tracing::info!(reservation = %number, "reservation accepted, fetching canonical record");

        // The write response lacks the full record; re-fetch by id.
        for reservation in self.fetch_reservations().await? {
            if reservation.reservation_number == number {
                return Ok(reservation);
            }
        }
        Err(RailError::ReservationNotFound(number))
    }

    async fn fetch_reservations(&self) -> Result<Vec<Reservation>, RailError> {
        let envelope = self
            .execute(&forms::endpoints::reservations(), &forms::reservations_form())
            .await?;
        let mut reservations = Vec::new();
        for (train, pay) in records::reservation_pairs(&envelope) {
            let number = train
                .get("pnrNo")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            let tickets = self.fetch_ticket_info(&number).await?;
            let mut reservation = records::map_reservation(&train, &pay, tickets)?;
            reservation.dep_station_name = self.stations.name_of(&reservation.dep_station_code);
            reservation.arr_station_name = self.stations.name_of(&reservation.arr_station_code);
            reservations.push(reservation);
        }
        Ok(reservations)
    }

    async fn fetch_ticket_info(&self, reservation_number: &str) -> Result<Vec<Ticket>, RailError> {
        let envelope = self
            .execute(
                &forms::endpoints::ticket_info(),
                &forms::ticket_info_form(reservation_number),
            )
            .await?;
        Ok(records::tickets_from(&envelope, reservation_number))
    }

    /// Configure standby notifications after a standby write went through.
    async fn submit_standby_options(
        &self,
        reservation_number: &str,
        agree_sms: bool,
        agree_class_change: bool,
        phone: &str,
    ) -> Result<(), RailError> {
        let form = forms::standby_option_form(
            reservation_number,
            agree_sms,
            agree_class_change,
            Some(phone),
        );
        let response = self
            .http
            .post(forms::endpoints::standby_option())
            .form(&form)
            .send()
            .await
            .map_err(RailError::Network)?;
        if !response.status().is_success() {
            tracing::warn!(
                status = response.status().as_u16(),
                "standby option update rejected"
            );
        }
        Ok(())
    }

    async fn reserve_standby_with_consent(
        &mut self,
        schedule: &Schedule,
        passengers: &[Passenger],
        preference: SeatPreference,
    ) -> Result<Reservation, RailError> {
        let reservation = self
            .submit_reserve(
                ReserveJob::Standby,
                schedule,
                passengers,
                preference.wants_special_standby(),
            )
            .await?;

        let phone = self
            .session
            .as_ref()
            .map(|s| s.phone_number.clone())
            .unwrap_or_default();
        if !phone.is_empty() {
            // Class-change consent follows the "-first" forms, which accept
            // either seat class.
            let agree_class_change = matches!(
                preference,
                SeatPreference::GeneralFirst | SeatPreference::SpecialFirst
            );
            self.submit_standby_options(
                &reservation.reservation_number,
                true,
                agree_class_change,
                &phone,
            )
            .await?;
        }
        Ok(reservation)
    }
}

impl RailBackend for SrtClient {
    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn login(&mut self, identifier: &str, credential: &str) -> Result<Session, RailError> {
        let method = LoginMethod::classify(identifier);
        let normalized = normalize_identifier(identifier, method);
        let form = forms::login_form(method, &normalized, credential);
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
        let response = self
            .http
            .post(forms::endpoints::logout())
            .send()
            .await
            .map_err(RailError::Network)?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RailError::backend("LOGOUT", body));
        }
        self.session = None;
        Ok(())
    }

    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Schedule>, RailError> {
        let passengers = passenger::prepare(&query.passengers)?;
        let (date, time) = query.resolve_window()?;

        let token = self.gate.run(self.notice.as_ref()).await?;
        let form = forms::search_form(
            &date,
            &time,
            query.departure.code.as_str(),
            query.arrival.code.as_str(),
            passenger::total(&passengers),
            &token,
        );
        let envelope = self
            .execute(&forms::endpoints::search_schedule(), &form)
            .await?;
        let schedules: Vec<Schedule> = records::schedules_from(&envelope, &self.stations)?
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

        // Sold-out runs with an open standby lane fall through to the
        // standby write instead of racing a seat that is already gone.
        if !schedule.seat_available() && !schedule.standby.not_applicable() {
            return self
                .reserve_standby_with_consent(schedule, &passengers, preference)
                .await;
        }

        self.submit_reserve(
            ReserveJob::Personal,
            schedule,
            &passengers,
            preference.wants_special_seat(schedule),
        )
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
        self.reserve_standby_with_consent(schedule, &passengers, preference.narrowed_for_standby())
            .await
    }

    async fn reservations(&mut self) -> Result<Vec<Reservation>, RailError> {
        self.require_session()?;
        self.fetch_reservations().await
    }

    async fn tickets(&mut self) -> Result<Vec<Ticket>, RailError> {
        self.require_session()?;
        let reservations = self.fetch_reservations().await?;
        Ok(reservations
            .into_iter()
            .filter(|r| r.paid)
            .flat_map(|r| r.tickets)
            .collect())
    }

    async fn cancel(&mut self, reservation: &Reservation) -> Result<(), RailError> {
        self.require_session()?;
        self.gate.run(self.notice.as_ref()).await?;
        self.execute(
            &forms::endpoints::cancel(),
            &forms::cancel_form(&reservation.reservation_number),
        )
        .await?;
        Ok(())
    }

    async fn pay(
        &mut self,
        reservation: &Reservation,
        card: &CardDetails,
    ) -> Result<bool, RailError> {
        let membership = self.require_session()?.membership_number.clone();
        self.gate.run(self.notice.as_ref()).await?;
        let settlement_date = backend_now().format("%Y%m%d").to_string();
        let form = forms::pay_form(reservation, card, &membership, &settlement_date);
        let body = self.post_raw(&forms::endpoints::payment(), &form).await?;
        records::pay_result(&body)
    }

    async fn refund(&mut self, ticket: &Ticket) -> Result<(), RailError> {
        self.require_session()?;
        self.gate.run(self.notice.as_ref()).await?;

        // The sale identifiers the refund write needs only exist on the
        // reservation-info lookup, which keys off a referer header.
        let referer = forms::endpoints::reserve_info_referer(&ticket.reservation_number);
        let response = self
            .http
            .post(forms::endpoints::reserve_info())
            .header("Referer", &referer)
            .send()
            .await
            .map_err(RailError::Network)?;
        let body = response.text().await.map_err(RailError::Network)?;
        let info = records::refund_source_from(&body)?;
        let source = records::refund_fields(&info)?;

        self.execute(
            &forms::endpoints::refund(),
            &forms::refund_form(
                &source.reservation_number,
                &source.sale_date,
                &source.sale_window,
                &source.sale_sequence,
                &source.return_password,
                &source.buyer_name,
            ),
        )
        .await?;
        Ok(())
    }

    fn clear_admission_cache(&mut self) {
        self.gate.clear();
    }
}
