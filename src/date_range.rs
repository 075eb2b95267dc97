use crate::{Error, Result};
use chrono::{Datelike, Days, Months, NaiveDate};
use clap::ValueEnum;
use std::fmt;

/// Predefined periods relative to the current day.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    /// The current day.
    #[default]
    Today,
    /// Monday to Sunday of the current week.
    Week,
    /// The current calendar month.
    Month,
    /// The current calendar year.
    Year,
}

impl Period {
    /// Resolves the period into a date range around `today`.
    pub fn resolve(self, today: NaiveDate) -> DateRange {
        let (start, end) = match self {
            Period::Today => (today, today),
            Period::Week => {
                let start = today - Days::new(today.weekday().num_days_from_monday().into());
                (start, start + Days::new(6))
            }
            Period::Month => {
                let start = today.with_day(1).unwrap_or(today);
                let end = (start + Months::new(1)) - Days::new(1);
                (start, end)
            }
            Period::Year => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
            ),
        };

        DateRange { start, end }
    }
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a new range. Fails if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<DateRange> {
        if start > end {
            return Err(Error::InvalidDateRange { start, end });
        }

        Ok(DateRange { start, end })
    }

    /// First day of the range.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns `true` if `date` lies within the range.
    pub fn contains(&self, date: &NaiveDate) -> bool {
        (self.start..=self.end).contains(date)
    }

    /// Iterates over every day in the range.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}
