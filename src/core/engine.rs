use std::borrow::Cow;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::allocator::split_contribution;
use super::error::SimulationError;
use super::ledger::Accounts;
use super::metrics::summarize;
use super::schedule::contribution_for_step;
use super::series::{compound_rates, month_index, select_window, validate_series};
use super::types::{
    AccountKind, InstrumentKind, InstrumentParameters, MonthlyObservation, RateObservation, RunParameters,
    StepRow, StrategyResult, StrategySummary, TaxConfig, TaxationMode,
};
use super::valuation::value_accounts;

/// Price data for one instrument: either a price/unit-value series or, for
/// savings-style instruments, a series of periodic rates.
#[derive(Debug, Clone)]
pub enum SeriesData {
    Prices(Vec<MonthlyObservation>),
    Rates(Vec<RateObservation>),
}

impl SeriesData {
    pub fn to_prices(&self) -> Result<Cow<'_, [MonthlyObservation]>, SimulationError> {
        match self {
            SeriesData::Prices(prices) => Ok(Cow::Borrowed(prices.as_slice())),
            SeriesData::Rates(rates) => Ok(Cow::Owned(compound_rates(rates, 1.0)?)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instrument {
    pub name: String,
    pub kind: InstrumentKind,
    pub fees: InstrumentParameters,
    pub series: SeriesData,
}

#[derive(Debug, Clone)]
pub struct InstrumentOutcome {
    pub result: StrategyResult,
    pub summary: StrategySummary,
}

/// Share-and-tax engine used for equity and gold.
#[derive(Debug)]
pub struct ShareStrategy<'a> {
    params: &'a RunParameters,
    fees: &'a InstrumentParameters,
    tax: &'a TaxConfig,
    accounts: Accounts,
    cap_reached: bool,
}

impl<'a> ShareStrategy<'a> {
    fn new(params: &'a RunParameters, fees: &'a InstrumentParameters, tax: &'a TaxConfig) -> Self {
        Self {
            params,
            fees,
            tax,
            accounts: Accounts::default(),
            cap_reached: false,
        }
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    fn invest(&mut self, amount: f64) {
        let mode = self.params.taxation_mode;
        let cap = self.tax.contribution_cap;
        let capped_basis = self.accounts.get(AccountKind::Capped).cumulative_invested;
        let split = split_contribution(mode, capped_basis, cap, amount);

        self.accounts.get_mut(AccountKind::Capped).deposit(split.capped);
        if mode == TaxationMode::CappedAdvantaged {
            let capped = self.accounts.get_mut(AccountKind::Capped);
            capped.cumulative_invested = capped.cumulative_invested.min(cap);
            if !self.cap_reached && capped.cumulative_invested >= cap {
                self.cap_reached = true;
                debug!(cap, "capped account is full, routing contributions to taxable account");
            }
        }
        self.accounts.get_mut(AccountKind::Taxable).deposit(split.taxable);
    }

    fn buy(&mut self, observed_price: f64) {
        let buy_price = self.fees.buy_price(observed_price);
        for kind in [AccountKind::Capped, AccountKind::Taxable] {
            self.accounts.get_mut(kind).buy_whole_shares(buy_price);
        }
    }

    fn open(&mut self, first: &MonthlyObservation) {
        self.invest(self.params.initial_lump_sum);
        debug!(
            capped = self.accounts.capped.cumulative_invested,
            taxable = self.accounts.taxable.cumulative_invested,
            "initial lump sum split"
        );
        self.buy(first.price);
    }

    fn advance(&mut self, obs: &MonthlyObservation, contribution: f64) -> StepRow {
        self.invest(contribution);
        self.buy(obs.price);

        let valuation = value_accounts(
            &self.accounts,
            obs.price,
            self.fees,
            self.tax,
            self.params.taxation_mode,
        );
        StepRow {
            month: obs.date,
            monthly_contribution: contribution,
            portfolio_value: valuation.portfolio_value,
            exit_value: valuation.exit_value,
            capped_invested: self.accounts.capped.cumulative_invested,
            taxable_invested: self.accounts.taxable.cumulative_invested,
            capped_shares: self.accounts.capped.shares,
            taxable_shares: self.accounts.taxable.shares,
        }
    }
}

/// Compounding engine for savings instruments: no fees, no tax, no cap.
/// All cash is converted into units every month, remainder included.
#[derive(Debug)]
pub struct FixedIncomeStrategy<'a> {
    params: &'a RunParameters,
    cash: f64,
    units: f64,
    total_invested: f64,
}

impl<'a> FixedIncomeStrategy<'a> {
    fn new(params: &'a RunParameters) -> Self {
        Self {
            params,
            cash: 0.0,
            units: 0.0,
            total_invested: 0.0,
        }
    }

    fn open(&mut self) {
        let lump = self.params.initial_lump_sum.max(0.0);
        self.cash = lump;
        self.total_invested = lump;
    }

    fn advance(&mut self, obs: &MonthlyObservation, contribution: f64) -> StepRow {
        self.cash += contribution;
        self.total_invested += contribution;
        if obs.price > 0.0 {
            self.units += self.cash / obs.price;
            self.cash = 0.0;
        }

        let value = self.units * obs.price + self.cash;
        StepRow {
            month: obs.date,
            monthly_contribution: contribution,
            portfolio_value: value,
            exit_value: value,
            capped_invested: 0.0,
            taxable_invested: self.total_invested,
            capped_shares: 0.0,
            taxable_shares: self.units,
        }
    }
}

#[derive(Debug)]
pub enum StrategyEngine<'a> {
    Shares(ShareStrategy<'a>),
    FixedIncome(FixedIncomeStrategy<'a>),
}

/// One simulation run. Observations are fed strictly in month order; the
/// first one opens the accounts with the lump sum. `finish` consumes the run.
/// Parameters are checked once by `new`; each observation is checked by `step`
/// before any state changes.
#[derive(Debug)]
pub struct Simulation<'a> {
    engine: StrategyEngine<'a>,
    params: &'a RunParameters,
    step: usize,
    last_month: Option<NaiveDate>,
    result: StrategyResult,
}

impl<'a> Simulation<'a> {
    pub fn new(
        kind: InstrumentKind,
        params: &'a RunParameters,
        fees: &'a InstrumentParameters,
        tax: &'a TaxConfig,
    ) -> Result<Self, SimulationError> {
        params.validate()?;
        fees.validate()?;
        tax.validate()?;
        let engine = match kind {
            InstrumentKind::Equity | InstrumentKind::Gold => {
                StrategyEngine::Shares(ShareStrategy::new(params, fees, tax))
            }
            InstrumentKind::FixedIncome => StrategyEngine::FixedIncome(FixedIncomeStrategy::new(params)),
        };
        Ok(Self {
            engine,
            params,
            step: 0,
            last_month: None,
            result: StrategyResult::default(),
        })
    }

    pub fn engine(&self) -> &StrategyEngine<'a> {
        &self.engine
    }

    pub fn steps(&self) -> usize {
        self.step
    }

    pub fn step(&mut self, obs: &MonthlyObservation) -> Result<(), SimulationError> {
        if !obs.price.is_finite() || obs.price <= 0.0 {
            return Err(SimulationError::NonPositivePrice {
                index: self.step,
                date: obs.date,
                price: obs.price,
            });
        }
        match self.last_month {
            None => match &mut self.engine {
                StrategyEngine::Shares(strategy) => strategy.open(obs),
                StrategyEngine::FixedIncome(strategy) => strategy.open(),
            },
            Some(previous) => {
                let gap = month_index(obs.date) - month_index(previous);
                if gap <= 0 {
                    return Err(SimulationError::NonMonotonicDates {
                        index: self.step,
                        date: obs.date,
                    });
                }
                if gap > 1 {
                    return Err(SimulationError::MissingMonth {
                        index: self.step,
                        date: obs.date,
                        previous,
                    });
                }
            }
        }

        self.step += 1;
        let contribution = contribution_for_step(
            self.params.initial_monthly_contribution,
            self.params.yearly_bump,
            self.step,
        );
        let row = match &mut self.engine {
            StrategyEngine::Shares(strategy) => strategy.advance(obs, contribution),
            StrategyEngine::FixedIncome(strategy) => strategy.advance(obs, contribution),
        };
        self.result.push(row);
        self.last_month = Some(obs.date);
        Ok(())
    }

    pub fn finish(self) -> StrategyResult {
        self.result
    }
}

/// Validates every input, selects the `[start, end]` window of `series` and
/// folds it through the engine for `kind`. Nothing runs if any check fails.
pub fn run_strategy(
    kind: InstrumentKind,
    series: &[MonthlyObservation],
    params: &RunParameters,
    fees: &InstrumentParameters,
    tax: &TaxConfig,
) -> Result<StrategyResult, SimulationError> {
    let mut simulation = Simulation::new(kind, params, fees, tax)?;
    validate_series(series)?;
    let window = select_window(series, params.start, params.end)?;

    simulation.result = StrategyResult::with_capacity(window.len());
    for obs in window {
        simulation.step(obs)?;
    }
    let result = simulation.finish();

    info!(
        ?kind,
        steps = result.len(),
        total_invested = result.total_invested_cash.last().copied().unwrap_or(0.0),
        exit_value = result.exit_value.last().copied().unwrap_or(0.0),
        "strategy run complete"
    );
    Ok(result)
}

pub fn run_instrument(
    instrument: &Instrument,
    params: &RunParameters,
    tax: &TaxConfig,
) -> Result<InstrumentOutcome, SimulationError> {
    let prices = instrument.series.to_prices()?;
    let result = run_strategy(instrument.kind, &prices, params, &instrument.fees, tax)?;
    let summary = summarize(&result, params, tax);
    Ok(InstrumentOutcome { result, summary })
}
