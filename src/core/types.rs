use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::SimulationError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxationMode {
    CappedAdvantaged,
    None,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstrumentKind {
    Equity,
    Gold,
    FixedIncome,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccountKind {
    Capped,
    Taxable,
}

/// One month of an adjusted price series (or normalized unit value for
/// fixed-income instruments).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyObservation {
    pub date: NaiveDate,
    pub price: f64,
}

/// One month of a periodic rate series, e.g. a savings account's monthly rate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    pub date: NaiveDate,
    pub rate: f64,
}

/// Trading fees applied on each buy and on the hypothetical liquidation.
/// The management fee is informational: it is expected to be already priced
/// into the observation series.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentParameters {
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub yearly_management_fee: f64,
}

impl InstrumentParameters {
    pub fn validate(&self) -> Result<(), SimulationError> {
        for (field, value) in [
            ("entry_fee", self.entry_fee),
            ("exit_fee", self.exit_fee),
            ("yearly_management_fee", self.yearly_management_fee),
        ] {
            if !value.is_finite() || !(0.0..1.0).contains(&value) {
                return Err(SimulationError::InvalidConfig {
                    field,
                    reason: format!("must be within [0, 1), got {value}"),
                });
            }
        }
        Ok(())
    }

    pub fn buy_price(&self, observed_price: f64) -> f64 {
        observed_price * (1.0 + self.entry_fee)
    }

    pub fn sell_price(&self, observed_price: f64) -> f64 {
        observed_price * (1.0 - self.exit_fee)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfig {
    pub contribution_cap: f64,
    pub capped_account_tax_rate: f64,
    pub taxable_account_tax_rate: f64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            contribution_cap: 150_000.0,
            capped_account_tax_rate: 0.172,
            taxable_account_tax_rate: 0.30,
        }
    }
}

impl TaxConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.contribution_cap.is_finite() || self.contribution_cap < 0.0 {
            return Err(SimulationError::InvalidConfig {
                field: "contribution_cap",
                reason: format!("must be a finite value >= 0, got {}", self.contribution_cap),
            });
        }
        for (field, value) in [
            ("capped_account_tax_rate", self.capped_account_tax_rate),
            ("taxable_account_tax_rate", self.taxable_account_tax_rate),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(SimulationError::InvalidConfig {
                    field,
                    reason: format!("must be within [0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }

    pub fn rate_for(&self, account: AccountKind) -> f64 {
        match account {
            AccountKind::Capped => self.capped_account_tax_rate,
            AccountKind::Taxable => self.taxable_account_tax_rate,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RunParameters {
    pub initial_lump_sum: f64,
    pub initial_monthly_contribution: f64,
    pub yearly_bump: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub taxation_mode: TaxationMode,
}

impl RunParameters {
    pub fn validate(&self) -> Result<(), SimulationError> {
        for (field, value) in [
            ("initial_lump_sum", self.initial_lump_sum),
            ("initial_monthly_contribution", self.initial_monthly_contribution),
            ("yearly_bump", self.yearly_bump),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimulationError::InvalidRunParameter {
                    field,
                    reason: format!("must be a finite value >= 0, got {value}"),
                });
            }
        }
        if self.start > self.end {
            return Err(SimulationError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Per-step output of a strategy run. All sequences have one entry per
/// simulated observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyResult {
    pub months: Vec<NaiveDate>,
    pub monthly_contribution: Vec<f64>,
    pub total_invested_cash: Vec<f64>,
    pub portfolio_value: Vec<f64>,
    pub exit_value: Vec<f64>,
    pub capped_invested: Vec<f64>,
    pub taxable_invested: Vec<f64>,
    pub capped_shares: Vec<f64>,
    pub taxable_shares: Vec<f64>,
}

impl StrategyResult {
    pub fn with_capacity(steps: usize) -> Self {
        Self {
            months: Vec::with_capacity(steps),
            monthly_contribution: Vec::with_capacity(steps),
            total_invested_cash: Vec::with_capacity(steps),
            portfolio_value: Vec::with_capacity(steps),
            exit_value: Vec::with_capacity(steps),
            capped_invested: Vec::with_capacity(steps),
            taxable_invested: Vec::with_capacity(steps),
            capped_shares: Vec::with_capacity(steps),
            taxable_shares: Vec::with_capacity(steps),
        }
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub(crate) fn push(&mut self, row: StepRow) {
        self.months.push(row.month);
        self.monthly_contribution.push(row.monthly_contribution);
        self.total_invested_cash
            .push(row.capped_invested + row.taxable_invested);
        self.portfolio_value.push(row.portfolio_value);
        self.exit_value.push(row.exit_value);
        self.capped_invested.push(row.capped_invested);
        self.taxable_invested.push(row.taxable_invested);
        self.capped_shares.push(row.capped_shares);
        self.taxable_shares.push(row.taxable_shares);
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct StepRow {
    pub month: NaiveDate,
    pub monthly_contribution: f64,
    pub portfolio_value: f64,
    pub exit_value: f64,
    pub capped_invested: f64,
    pub taxable_invested: f64,
    pub capped_shares: f64,
    pub taxable_shares: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySummary {
    pub months: usize,
    pub total_invested: f64,
    pub final_portfolio_value: f64,
    pub final_exit_value: f64,
    pub total_return: Option<f64>,
    pub annualized_return: Option<f64>,
    pub cap_exceeded: bool,
}
