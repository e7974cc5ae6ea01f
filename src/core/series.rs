use chrono::{Datelike, NaiveDate};

use super::error::SimulationError;
use super::types::{MonthlyObservation, RateObservation};

/// Months since year 0; any day within a month maps to the same index.
pub fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn check_months<I>(dates: I) -> Result<(), SimulationError>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut previous: Option<NaiveDate> = None;
    for (index, date) in dates.into_iter().enumerate() {
        if let Some(prev) = previous {
            let step = month_index(date) - month_index(prev);
            if step <= 0 {
                return Err(SimulationError::NonMonotonicDates { index, date });
            }
            if step > 1 {
                return Err(SimulationError::MissingMonth {
                    index,
                    date,
                    previous: prev,
                });
            }
        }
        previous = Some(date);
    }
    if previous.is_none() {
        return Err(SimulationError::EmptySeries);
    }
    Ok(())
}

/// Rejects empty series, out-of-order or duplicate months, gaps, and
/// non-positive prices.
pub fn validate_series(series: &[MonthlyObservation]) -> Result<(), SimulationError> {
    check_months(series.iter().map(|obs| obs.date))?;
    for (index, obs) in series.iter().enumerate() {
        if !obs.price.is_finite() || obs.price <= 0.0 {
            return Err(SimulationError::NonPositivePrice {
                index,
                date: obs.date,
                price: obs.price,
            });
        }
    }
    Ok(())
}

pub fn validate_rates(rates: &[RateObservation]) -> Result<(), SimulationError> {
    check_months(rates.iter().map(|obs| obs.date))?;
    for (index, obs) in rates.iter().enumerate() {
        if !obs.rate.is_finite() || obs.rate <= -1.0 {
            return Err(SimulationError::InvalidRate {
                index,
                date: obs.date,
                rate: obs.rate,
            });
        }
    }
    Ok(())
}

/// Observations whose month falls within `[start, end]`. The series must
/// already be valid. Data ending before `end` truncates the window.
pub fn select_window(
    series: &[MonthlyObservation],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<&[MonthlyObservation], SimulationError> {
    if start > end {
        return Err(SimulationError::InvalidRange { start, end });
    }
    let first = series.first().ok_or(SimulationError::EmptySeries)?;
    let (start_idx, end_idx) = (month_index(start), month_index(end));
    if start_idx < month_index(first.date) {
        return Err(SimulationError::StartBeforeData {
            start,
            first_available: first.date,
        });
    }

    let lo = series.partition_point(|obs| month_index(obs.date) < start_idx);
    let hi = series.partition_point(|obs| month_index(obs.date) <= end_idx);
    if lo >= hi {
        return Err(SimulationError::EmptySeries);
    }
    Ok(&series[lo..hi])
}

/// Turns periodic rates into a cumulative unit-value series: the first month
/// is worth `initial_value` and each later month compounds the previous
/// month's rate.
pub fn compound_rates(
    rates: &[RateObservation],
    initial_value: f64,
) -> Result<Vec<MonthlyObservation>, SimulationError> {
    validate_rates(rates)?;
    if !initial_value.is_finite() || initial_value <= 0.0 {
        return Err(SimulationError::InvalidRunParameter {
            field: "initial_value",
            reason: format!("must be a finite value > 0, got {initial_value}"),
        });
    }

    let mut values = Vec::with_capacity(rates.len());
    let mut value = initial_value;
    let mut previous_rate = None;
    for obs in rates {
        if let Some(rate) = previous_rate {
            value *= 1.0 + rate;
        }
        values.push(MonthlyObservation {
            date: obs.date,
            price: value,
        });
        previous_rate = Some(obs.rate);
    }
    Ok(values)
}

/// Monthly series for `count` consecutive months starting at `start`.
pub fn monthly_dates(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut current = NaiveDate::from_ymd_opt(start.year(), start.month(), 1).unwrap_or(start);
    for _ in 0..count {
        dates.push(current);
        match current.checked_add_months(chrono::Months::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}
