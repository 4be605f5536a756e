//! Fuzzy calendar dates — day, month, and/or year may be unknown.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A date whose components may individually be unknown (zero).
///
/// Stored as a single sortable integer with the month in the most
/// significant digit group — `month * 1_000_000 + day * 10_000 + year` — so
/// month/day range scans (birthday reminders) work independently of the
/// year.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct FuzzyDate {
  pub year:  u16,
  pub month: u8,
  pub day:   u8,
}

impl FuzzyDate {
  pub const fn new(year: u16, month: u8, day: u8) -> Self {
    Self { year, month, day }
  }

  /// Decode from the integer column representation.
  pub const fn from_int(coded: u32) -> Self {
    Self {
      month: (coded / 1_000_000) as u8,
      day:   ((coded / 10_000) % 100) as u8,
      year:  (coded % 10_000) as u16,
    }
  }

  /// Encode into the sortable integer column representation.
  pub const fn to_int(self) -> u32 {
    (self.month as u32) * 1_000_000 + (self.day as u32) * 10_000 + self.year as u32
  }

  pub const fn has_year(self) -> bool { self.year > 0 }

  pub const fn has_month(self) -> bool { self.month > 0 }

  pub const fn has_day(self) -> bool { self.day > 0 }

  /// True if no component is known at all.
  pub const fn is_unknown(self) -> bool {
    !(self.has_year() || self.has_month() || self.has_day())
  }
}

impl fmt::Display for FuzzyDate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
  }
}
