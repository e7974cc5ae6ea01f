use super::ledger::{AccountBucket, Accounts};
use super::types::{AccountKind, InstrumentParameters, TaxConfig, TaxationMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub portfolio_value: f64,
    pub exit_value: f64,
}

/// Tax on a liquidation gain. Principal is never taxed: the after-tax gain is
/// added back onto the amount invested. Losses and zero gains pass through.
pub fn after_tax_value(
    liquidation_value: f64,
    cumulative_invested: f64,
    tax_rate: f64,
    mode: TaxationMode,
) -> f64 {
    let gain = liquidation_value - cumulative_invested;
    if gain <= 0.0 || mode == TaxationMode::None {
        return liquidation_value;
    }
    gain * (1.0 - tax_rate) + cumulative_invested
}

pub fn bucket_exit_value(
    bucket: &AccountBucket,
    account: AccountKind,
    sell_price: f64,
    tax: &TaxConfig,
    mode: TaxationMode,
) -> f64 {
    let liquidation_value = bucket.market_value(sell_price);
    after_tax_value(
        liquidation_value,
        bucket.cumulative_invested,
        tax.rate_for(account),
        mode,
    )
}

/// Mark-to-market value and hypothetical after-fee, after-tax liquidation
/// value of both buckets at `observed_price`.
pub fn value_accounts(
    accounts: &Accounts,
    observed_price: f64,
    fees: &InstrumentParameters,
    tax: &TaxConfig,
    mode: TaxationMode,
) -> Valuation {
    let sell_price = fees.sell_price(observed_price);
    let mut portfolio_value = 0.0;
    let mut exit_value = 0.0;
    for (account, bucket) in accounts.iter() {
        portfolio_value += bucket.market_value(observed_price);
        exit_value += bucket_exit_value(bucket, account, sell_price, tax, mode);
    }
    Valuation {
        portfolio_value,
        exit_value,
    }
}
