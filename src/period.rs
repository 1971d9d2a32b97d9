use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Last7Days,
    Last14Days,
    ThisMonth,
    LastMonth,
    Custom,
}

impl ReportPeriod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "last_7_days" => Some(Self::Last7Days),
            "last_14_days" => Some(Self::Last14Days),
            "this_month" => Some(Self::ThisMonth),
            "last_month" => Some(Self::LastMonth),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Last7Days => "last_7_days",
            Self::Last14Days => "last_14_days",
            Self::ThisMonth => "this_month",
            Self::LastMonth => "last_month",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("custom period needs both startDate and endDate")]
    MissingCustomBounds,
    #[error("startDate must not be after endDate")]
    Inverted,
    #[error("date out of supported range")]
    OutOfRange,
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn days_before(d: NaiveDate, n: u64) -> Result<NaiveDate, PeriodError> {
    d.checked_sub_days(Days::new(n)).ok_or(PeriodError::OutOfRange)
}

/// Inclusive date range for a period, relative to `today`.
pub fn resolve(
    period: ReportPeriod,
    today: NaiveDate,
    custom: Option<(NaiveDate, NaiveDate)>,
) -> Result<DateRange, PeriodError> {
    let range = match period {
        ReportPeriod::Last7Days => DateRange {
            start: days_before(today, 6)?,
            end: today,
        },
        ReportPeriod::Last14Days => DateRange {
            start: days_before(today, 13)?,
            end: today,
        },
        ReportPeriod::ThisMonth => DateRange {
            start: first_of_month(today),
            end: today,
        },
        ReportPeriod::LastMonth => {
            let end = days_before(first_of_month(today), 1)?;
            DateRange {
                start: first_of_month(end),
                end,
            }
        }
        ReportPeriod::Custom => {
            let (start, end) = custom.ok_or(PeriodError::MissingCustomBounds)?;
            DateRange { start, end }
        }
    };
    if range.start > range.end {
        return Err(PeriodError::Inverted);
    }
    Ok(range)
}
