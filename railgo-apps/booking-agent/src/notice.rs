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

//! # Outbound Collaborator Interfaces
//!
//! The engine reports progress and asks for go/no-go decisions through these
//! narrow traits; delivery (terminal, messenger bot, ...) is the caller's
//! concern.

use crate::errors::RailError;

/// Receives human-readable status lines: queue position while waiting for
/// admission, per-iteration progress, terminal success/failure.
pub trait NoticeSink {
    fn notice(&self, message: &str);
}

/// Discards all notices.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotice;

impl NoticeSink for NullNotice {
    fn notice(&self, _message: &str) {}
}

/// Consulted when the watcher hits an error its classification table does
/// not recognize: `true` keeps polling, `false` aborts the run.
pub trait Operator {
    fn confirm_continue(&self, error: &RailError) -> bool;
}

/// Always aborts on unclassified errors; the safe default for unattended
/// runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortingOperator;

impl Operator for AbortingOperator {
    fn confirm_continue(&self, _error: &RailError) -> bool {
        false
    }
}
