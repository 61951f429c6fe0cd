//! Common types used across the ledger

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Bags and quintals tracked side by side
///
/// Quintals are not derived from bags on the fly because the bag size can
/// differ from one run to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub bags: Decimal,
    pub quintals: Decimal,
}

impl Quantity {
    pub const ZERO: Quantity = Quantity {
        bags: Decimal::ZERO,
        quintals: Decimal::ZERO,
    };

    pub fn new(bags: Decimal, quintals: Decimal) -> Self {
        Self { bags, quintals }
    }

    /// Quantity for a number of bags of a given size
    pub fn from_bags(bags: Decimal, bag_size_kg: Decimal) -> Self {
        Self {
            bags,
            quintals: quintals_for(bags, bag_size_kg),
        }
    }

    /// Both magnitudes are below `epsilon`
    pub fn is_negligible(&self, epsilon: Decimal) -> bool {
        self.bags.abs() < epsilon && self.quintals.abs() < epsilon
    }

    /// Either magnitude has dropped below `-epsilon`
    pub fn is_short(&self, epsilon: Decimal) -> bool {
        self.bags < -epsilon || self.quintals < -epsilon
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.bags.saturating_add(rhs.bags), self.quintals.saturating_add(rhs.quintals))
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.bags.saturating_sub(rhs.bags), self.quintals.saturating_sub(rhs.quintals))
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity::new(-self.bags, -self.quintals)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        *self = *self + rhs;
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, |acc, q| acc + q)
    }
}

/// Largest bag, quintal or kilogram figure a record may carry
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Smallest usable bag size, 100 g
pub const MIN_BAG_SIZE_KG: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Quintals held by `bags` bags of `bag_size_kg` each (1 quintal = 100 kg)
pub fn quintals_for(bags: Decimal, bag_size_kg: Decimal) -> Decimal {
    bags.saturating_mul(bag_size_kg) / Decimal::ONE_HUNDRED
}

/// Number of `bag_size_kg` bags needed to hold `quintals`
pub fn bags_for(quintals: Decimal, bag_size_kg: Decimal) -> Decimal {
    saturating_div(quintals.saturating_mul(Decimal::ONE_HUNDRED), bag_size_kg)
}

/// `lhs / rhs`, pinned to the representable range; zero when `rhs` is zero
pub fn saturating_div(lhs: Decimal, rhs: Decimal) -> Decimal {
    if rhs.is_zero() {
        return Decimal::ZERO;
    }
    lhs.checked_div(rhs).unwrap_or_else(|| {
        if lhs.is_sign_negative() == rhs.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }
    })
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> LedgerResult<Self> {
        if start > end {
            return Err(LedgerError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every calendar day in the range, oldest first
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Smallest range covering every date yielded by `dates`
    pub fn spanning<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Option<Self> {
        dates.into_iter().fold(None, |acc, date| match acc {
            None => Some(Self::single(date)),
            Some(range) => Some(Self {
                start: range.start.min(date),
                end: range.end.max(date),
            }),
        })
    }
}
