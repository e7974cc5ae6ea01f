mod allocator;
mod engine;
mod error;
mod ledger;
mod metrics;
mod schedule;
mod series;
mod types;
mod valuation;

pub use allocator::{Allocation, split_contribution};
pub use engine::{
    FixedIncomeStrategy, Instrument, InstrumentOutcome, SeriesData, ShareStrategy, Simulation,
    StrategyEngine, run_instrument, run_strategy,
};
pub use error::SimulationError;
pub use ledger::{AccountBucket, Accounts, whole_shares_affordable};
pub use metrics::{annualized_return, summarize, total_return};
pub use schedule::contribution_for_step;
pub use series::{compound_rates, month_index, monthly_dates, select_window, validate_rates, validate_series};
pub use types::{
    AccountKind, InstrumentKind, InstrumentParameters, MonthlyObservation, RateObservation,
    RunParameters, StrategyResult, StrategySummary, TaxConfig, TaxationMode,
};
pub use valuation::{Valuation, after_tax_value, bucket_exit_value, value_accounts};
