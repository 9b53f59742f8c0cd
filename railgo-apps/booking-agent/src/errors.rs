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

//! # Error Taxonomy
//!
//! Every failure the engine surfaces, shaped the way the booking watcher
//! consumes it: the variant alone decides retry vs confirm vs abort.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RailError {
    /// Explicit login rejection: unknown member, bad password, blocked IP.
    /// The raw backend message is kept for diagnostics.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The server reports the session as anonymous mid-run.
    #[error("not logged in")]
    NotLoggedIn,

    /// A search matched nothing. Expected while polling a tight window.
    #[error("no matching schedules")]
    NoResults,

    /// A write lost the race for the last seats. Expected under contention.
    #[error("sold out")]
    SoldOut,

    /// The backend flagged a repeated write. Never auto-retried.
    #[error("duplicate booking: {0}")]
    Duplicate(String),

    /// The admission-queue handshake failed. The cached token has already
    /// been cleared when this surfaces.
    #[error("admission queue failed: {0}")]
    Queue(String),

    /// Connection-level transport failure.
    #[error("network failure: {0}")]
    Network(#[from] wreq::Error),

    /// Server rejection the static code tables do not recognize.
    #[error("backend rejected request [{code}]: {message}")]
    Backend { code: String, message: String },

    /// The post-write lookup could not find the reservation number the write
    /// itself returned. Integrity fault; surfaced as-is.
    #[error("reservation {0} not found after booking")]
    ReservationNotFound(String),

    /// Passenger set rejected before any network call.
    #[error("invalid passenger set: {0}")]
    InvalidPassenger(String),

    /// Caller-supplied request rejected before any network call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The pre-login key handshake did not yield a usable cipher key.
    #[error("credential codec: {0}")]
    Codec(String),

    /// A response body that does not fit the protocol envelope at all.
    #[error("malformed response: {0}")]
    Protocol(String),
}

impl RailError {
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        RailError::Backend {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_backend_code_and_message() {
        let err = RailError::backend("ERR000", "unexpected state");
        assert_eq!(
            err.to_string(),
            "backend rejected request [ERR000]: unexpected state"
        );
    }

    #[test]
    fn display_preserves_auth_message() {
        let err = RailError::Auth("password mismatch (code 12)".into());
        assert!(err.to_string().contains("password mismatch"));
    }
}
