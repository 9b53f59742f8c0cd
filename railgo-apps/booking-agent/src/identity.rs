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

//! # Login Identifier Classification
//!
//! Both rail backends accept a membership number, an email address, or a
//! phone number as the login identifier and expect a matching mode code in
//! the login form. The shape of the identifier decides the mode; phone
//! numbers are submitted without their hyphens.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3}-\d{3,4}-\d{4}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    MembershipNumber,
    Email,
    PhoneNumber,
}

impl LoginMethod {
    /// Classify an identifier by shape. Anything that is neither an email
    /// nor a hyphenated phone number is treated as a membership number.
    pub fn classify(identifier: &str) -> Self {
        if EMAIL_RE.is_match(identifier) {
            LoginMethod::Email
        } else if PHONE_RE.is_match(identifier) {
            LoginMethod::PhoneNumber
        } else {
            LoginMethod::MembershipNumber
        }
    }
}

/// Identifier in the form the login endpoints expect: phone numbers lose
/// their hyphens, everything else passes through unchanged.
pub fn normalize_identifier(identifier: &str, method: LoginMethod) -> String {
    match method {
        LoginMethod::PhoneNumber => identifier.replace('-', ""),
        _ => identifier.to_string(),
    }
}
