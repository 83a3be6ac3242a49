//! # Order Numbers
//!
//! Human-readable transaction identifiers: `{YYYYMMDD}-{seq}`.
//!
//! ```text
//! 20240315-0001   first sale of the day
//! 20240315-0042
//! 20240315-12345  the sequence widens past 9999
//! ```
//!
//! Allocation (the next sequence for a tenant and day) needs the database
//! and lives in harbor-db; this module only formats and parses.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

const DATE_FORMAT: &str = "%Y%m%d";

/// Parsed order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderNumber {
    pub date: NaiveDate,
    pub sequence: u32,
}

impl OrderNumber {
    pub fn new(date: NaiveDate, sequence: u32) -> Self {
        OrderNumber { date, sequence }
    }

    /// The `YYYYMMDD-` prefix shared by every order number of a day.
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use harbor_core::order_number::OrderNumber;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    /// assert_eq!(OrderNumber::day_prefix(date), "20240315-");
    /// ```
    pub fn day_prefix(date: NaiveDate) -> String {
        format!("{}-", date.format(DATE_FORMAT))
    }

    /// The order number following the highest sequence used on `date`, or
    /// `None` once the day's sequence space is exhausted.
    pub fn next_after(date: NaiveDate, highest: Option<u32>) -> Option<Self> {
        highest
            .unwrap_or(0)
            .checked_add(1)
            .map(|sequence| OrderNumber::new(date, sequence))
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}", self.date.format(DATE_FORMAT), self.sequence)
    }
}

impl FromStr for OrderNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidOrderNumber(s.to_string());
        let (date_part, seq_part) = s.split_once('-').ok_or_else(invalid)?;
        if date_part.len() != 8 || seq_part.len() < 4 || !seq_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|_| invalid())?;
        let sequence = seq_part.parse::<u32>().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }
        Ok(OrderNumber { date, sequence })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
