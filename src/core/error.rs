use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("start month {start} is after end month {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("start month {start} precedes the earliest available data ({first_available})")]
    StartBeforeData {
        start: NaiveDate,
        first_available: NaiveDate,
    },
    #[error("observation series is empty")]
    EmptySeries,
    #[error("observation {index} ({date}) does not come after the previous month")]
    NonMonotonicDates { index: usize, date: NaiveDate },
    #[error("observation {index} ({date}) skips one or more months after {previous}")]
    MissingMonth {
        index: usize,
        date: NaiveDate,
        previous: NaiveDate,
    },
    #[error("observation {index} ({date}) has non-positive price {price}")]
    NonPositivePrice {
        index: usize,
        date: NaiveDate,
        price: f64,
    },
    #[error("rate {index} ({date}) must be finite and > -1, got {rate}")]
    InvalidRate {
        index: usize,
        date: NaiveDate,
        rate: f64,
    },
    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("invalid run parameter `{field}`: {reason}")]
    InvalidRunParameter { field: &'static str, reason: String },
}
