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

//! # Booking Watcher
//!
//! The polling loop that drives search -> match -> reserve until a seat is
//! secured or the operator aborts. This is the only place retry policy
//! lives: every error goes through `classify`, and nothing below this layer
//! retries on its own. Inter-iteration delays come from the gamma pacer so
//! the loop never emits a fixed-interval request fingerprint; sleeps are
//! interruptible at iteration boundaries only, never mid-call.

use railgo_retry_pacer::{AbortSignal, GammaPacer, PacerError};

use crate::backend::{RailBackend, Reservation, SearchQuery};
use crate::errors::RailError;
use crate::notice::{NoticeSink, Operator};
use crate::schedule::{SeatPreference, TrainKey};

/// What the classification table tells the loop to do with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Expected or transient; back off and poll again silently.
    Retry,
    /// Unrecognized; keep polling only if the operator agrees.
    RetryAfterConfirm,
    /// Terminal; surface immediately.
    Abort,
}

/// The central retry-policy table. `NotLoggedIn` classifies as `Retry`
/// because the loop re-authenticates before the next attempt; everything
/// unrecognized defaults to asking the operator, never to silent retry.
pub fn classify(error: &RailError) -> Disposition {
    match error {
        RailError::NoResults
        | RailError::SoldOut
        | RailError::Queue(_)
        | RailError::Network(_)
        | RailError::NotLoggedIn => Disposition::Retry,

        RailError::Backend { .. } | RailError::Protocol(_) => Disposition::RetryAfterConfirm,

        RailError::Auth(_)
        | RailError::Duplicate(_)
        | RailError::ReservationNotFound(_)
        | RailError::InvalidPassenger(_)
        | RailError::InvalidRequest(_)
        | RailError::Codec(_) => Disposition::Abort,
    }
}

/// One watch assignment: the query to replay and the runs worth booking.
#[derive(Debug, Clone)]
pub struct WatchPlan {
    pub query: SearchQuery,
    /// Runs the operator picked from an earlier search; empty means any
    /// run the filtered search returns is fair game.
    pub chosen: Vec<TrainKey>,
    pub preference: SeatPreference,
}

impl WatchPlan {
    fn wants(&self, key: &TrainKey) -> bool {
        self.chosen.is_empty() || self.chosen.contains(key)
    }
}

/// How a watch ended when it did not fail outright.
#[derive(Debug)]
pub enum WatchOutcome {
    Reserved(Reservation),
    /// The abort signal fired between iterations.
    Aborted,
}

pub struct BookingWatcher<'a, B> {
    backend: &'a mut B,
    notice: &'a dyn NoticeSink,
    operator: &'a dyn Operator,
    pacer: GammaPacer,
    abort: AbortSignal,
    relogin: Option<(String, String)>,
}

impl<'a, B: RailBackend> BookingWatcher<'a, B> {
    pub fn new(backend: &'a mut B, notice: &'a dyn NoticeSink, operator: &'a dyn Operator) -> Self {
        BookingWatcher {
            backend,
            notice,
            operator,
            pacer: GammaPacer::default(),
            abort: AbortSignal::never(),
            relogin: None,
        }
    }

    pub fn with_pacer(mut self, pacer: GammaPacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Credentials for re-authentication when the session drops mid-run.
    pub fn with_relogin(mut self, identifier: impl Into<String>, credential: impl Into<String>) -> Self {
        self.relogin = Some((identifier.into(), credential.into()));
        self
    }

    /// Poll until a chosen run is reserved, a terminal error surfaces, or
    /// the abort signal fires.
    pub async fn watch(&mut self, plan: &WatchPlan) -> Result<WatchOutcome, RailError> {
        let mut iteration: u64 = 0;
        loop {
            if self.abort.is_aborted() {
                return Ok(WatchOutcome::Aborted);
            }
            iteration += 1;

            match self.attempt(plan).await {
                Ok(Some(reservation)) => {
                    self.notice
                        .notice(&format!("reserved: {reservation}"));
                    return Ok(WatchOutcome::Reserved(reservation));
                }
                Ok(None) => {
                    tracing::debug!(iteration, "no chosen run bookable yet");
                }
                Err(error) => match classify(&error) {
                    Disposition::Retry => {
                        tracing::debug!(iteration, %error, "retrying after backoff");
                        if matches!(error, RailError::NotLoggedIn) {
                            self.re_authenticate().await?;
                        }
                    }
                    Disposition::RetryAfterConfirm => {
                        self.notice.notice(&format!("unrecognized failure: {error}"));
                        if !self.operator.confirm_continue(&error) {
                            return Err(error);
                        }
                    }
                    Disposition::Abort => {
                        self.notice.notice(&format!("aborting: {error}"));
                        return Err(error);
                    }
                },
            }

            match self.pacer.pause(&self.abort).await {
                Ok(()) => {}
                Err(PacerError::Aborted) => return Ok(WatchOutcome::Aborted),
            }
        }
    }

    /// One iteration: replay the search, re-find the chosen runs, reserve
    /// the first that satisfies the preference.
    async fn attempt(&mut self, plan: &WatchPlan) -> Result<Option<Reservation>, RailError> {
        let schedules = self.backend.search(&plan.query).await?;
        for schedule in &schedules {
            if !plan.wants(&schedule.key()) {
                continue;
            }
            self.notice.notice(&schedule.to_string());
            if plan.preference.matches(schedule) {
                let reservation = self
                    .backend
                    .reserve(schedule, &plan.query.passengers, plan.preference)
                    .await?;
                return Ok(Some(reservation));
            }
        }
        Ok(None)
    }

    async fn re_authenticate(&mut self) -> Result<(), RailError> {
        let Some((identifier, credential)) = self.relogin.clone() else {
            // Nothing to re-login with; the session loss is terminal here.
            return Err(RailError::NotLoggedIn);
        };
        self.notice.notice("session lost, logging in again");
        self.backend.login(&identifier, &credential).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_outcomes_retry_silently() {
        assert_eq!(classify(&RailError::NoResults), Disposition::Retry);
        assert_eq!(classify(&RailError::SoldOut), Disposition::Retry);
        assert_eq!(classify(&RailError::Queue("x".into())), Disposition::Retry);
        assert_eq!(classify(&RailError::NotLoggedIn), Disposition::Retry);
    }

    #[test]
    fn unknown_rejections_ask_the_operator() {
        assert_eq!(
            classify(&RailError::backend("X1", "odd")),
            Disposition::RetryAfterConfirm
        );
        assert_eq!(
            classify(&RailError::Protocol("garbled".into())),
            Disposition::RetryAfterConfirm
        );
    }

    #[test]
    fn terminal_errors_abort() {
        assert_eq!(classify(&RailError::Auth("no".into())), Disposition::Abort);
        assert_eq!(
            classify(&RailError::Duplicate("again".into())),
            Disposition::Abort
        );
        assert_eq!(
            classify(&RailError::ReservationNotFound("000".into())),
            Disposition::Abort
        );
        assert_eq!(
            classify(&RailError::Codec("bad key".into())),
            Disposition::Abort
        );
    }
}
