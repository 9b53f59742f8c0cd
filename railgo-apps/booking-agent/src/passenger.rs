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

//! # Passenger Aggregation
//!
//! A heterogeneous passenger request is normalized into the minimal set of
//! line items the backends accept: grouped by (category, discount code,
//! card reference), counts summed, zero-count groups dropped, first-seen
//! order preserved. `combine` is idempotent.

use serde::{Deserialize, Serialize};

use crate::errors::RailError;

/// Fare categories the backends distinguish. Toddler is a second-backend
/// refinement of child (own default discount code); the first backend has no
/// code for it and rejects it up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerCategory {
    Adult,
    Child,
    Toddler,
    Senior,
    Disability1To3,
    Disability4To6,
}

impl PassengerCategory {
    /// Default discount code applied when the line item does not set one.
    pub fn default_discount_code(self) -> &'static str {
        match self {
            PassengerCategory::Adult | PassengerCategory::Child => "000",
            PassengerCategory::Toddler => "321",
            PassengerCategory::Senior => "131",
            PassengerCategory::Disability1To3 => "111",
            PassengerCategory::Disability4To6 => "112",
        }
    }

    /// Passenger type code on the first backend's forms. Toddlers have no
    /// code there.
    pub fn srt_type_code(self) -> Option<&'static str> {
        match self {
            PassengerCategory::Adult => Some("1"),
            PassengerCategory::Child => Some("5"),
            PassengerCategory::Toddler => None,
            PassengerCategory::Senior => Some("4"),
            PassengerCategory::Disability1To3 => Some("2"),
            PassengerCategory::Disability4To6 => Some("3"),
        }
    }

    /// Passenger type code on the second backend's forms; there the discount
    /// code carries the actual fare distinction.
    pub fn korail_type_code(self) -> &'static str {
        match self {
            PassengerCategory::Adult
            | PassengerCategory::Senior
            | PassengerCategory::Disability1To3
            | PassengerCategory::Disability4To6 => "1",
            PassengerCategory::Child | PassengerCategory::Toddler => "3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PassengerCategory::Adult => "adult",
            PassengerCategory::Child => "child",
            PassengerCategory::Toddler => "toddler",
            PassengerCategory::Senior => "senior",
            PassengerCategory::Disability1To3 => "disability 1-3",
            PassengerCategory::Disability4To6 => "disability 4-6",
        }
    }
}

/// Discount card attached to a line item (membership discount schemes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardReference {
    pub code: String,
    pub number: String,
    pub password: String,
}

/// One normalized passenger line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub category: PassengerCategory,
    pub count: u32,
    pub discount_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardReference>,
}

impl Passenger {
    pub fn new(category: PassengerCategory, count: u32) -> Self {
        Passenger {
            category,
            count,
            discount_code: category.default_discount_code().to_string(),
            card: None,
        }
    }

    pub fn adult(count: u32) -> Self {
        Passenger::new(PassengerCategory::Adult, count)
    }

    pub fn with_discount_code(mut self, code: impl Into<String>) -> Self {
        self.discount_code = code.into();
        self
    }

    pub fn with_card(mut self, card: CardReference) -> Self {
        self.card = Some(card);
        self
    }

    fn group_key(&self) -> (PassengerCategory, &str, Option<&CardReference>) {
        (self.category, self.discount_code.as_str(), self.card.as_ref())
    }
}

/// Merge line items with identical (category, discount code, card) keys,
/// drop empty groups, keep first-seen group order.
pub fn combine(items: &[Passenger]) -> Vec<Passenger> {
    let mut merged: Vec<Passenger> = Vec::new();
    for item in items {
        match merged.iter_mut().find(|m| m.group_key() == item.group_key()) {
            Some(existing) => existing.count += item.count,
            None => merged.push(item.clone()),
        }
    }
    merged.retain(|m| m.count > 0);
    merged
}

/// Total seat count across line items.
pub fn total(items: &[Passenger]) -> u32 {
    items.iter().map(|p| p.count).sum()
}

/// Normalize and validate a passenger request before it reaches the wire.
pub fn prepare(items: &[Passenger]) -> Result<Vec<Passenger>, RailError> {
    let combined = combine(items);
    if total(&combined) == 0 {
        return Err(RailError::InvalidPassenger(
            "passenger counts sum to zero".into(),
        ));
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_merges_identical_groups() {
        let items = vec![Passenger::adult(1), Passenger::adult(2)];
        let merged = combine(&items);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].count, 3);
    }

    #[test]
    fn combine_keeps_distinct_discounts_apart() {
        let items = vec![
            Passenger::adult(1),
            Passenger::adult(1).with_discount_code("101"),
        ];
        assert_eq!(combine(&items).len(), 2);
    }

    #[test]
    fn combine_is_idempotent() {
        let items = vec![
            Passenger::adult(2),
            Passenger::new(PassengerCategory::Child, 1),
            Passenger::adult(1),
            Passenger::new(PassengerCategory::Senior, 0),
        ];
        let once = combine(&items);
        let twice = combine(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn zero_count_groups_are_dropped() {
        let items = vec![Passenger::adult(0), Passenger::new(PassengerCategory::Child, 1)];
        let merged = combine(&items);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].category, PassengerCategory::Child);
    }

    #[test]
    fn prepare_rejects_zero_total() {
        let items = vec![Passenger::adult(0), Passenger::new(PassengerCategory::Senior, 0)];
        assert!(matches!(
            prepare(&items),
            Err(RailError::InvalidPassenger(_))
        ));
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let items = vec![
            Passenger::new(PassengerCategory::Senior, 1),
            Passenger::adult(1),
            Passenger::new(PassengerCategory::Senior, 1),
        ];
        let merged = combine(&items);
        assert_eq!(merged[0].category, PassengerCategory::Senior);
        assert_eq!(merged[0].count, 2);
        assert_eq!(merged[1].category, PassengerCategory::Adult);
    }
}
