use super::types::AccountKind;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountBucket {
    pub cash: f64,
    pub shares: f64,
    pub cumulative_invested: f64,
}

impl AccountBucket {
    /// Adds principal. Both the cash balance and the tax basis grow by the
    /// same amount; negative amounts are ignored.
    pub fn deposit(&mut self, amount: f64) {
        let amount = amount.max(0.0);
        self.cash += amount;
        self.cumulative_invested += amount;
    }

    /// Spends as much cash as possible on whole shares at `buy_price` and
    /// returns the number of shares bought. Leftover cash stays in the bucket.
    pub fn buy_whole_shares(&mut self, buy_price: f64) -> f64 {
        let bought = whole_shares_affordable(self.cash, buy_price);
        if bought > 0.0 {
            self.shares += bought;
            self.cash = (self.cash - bought * buy_price).max(0.0);
        }
        bought
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price + self.cash
    }
}

/// Largest whole number of shares `cash` pays for at `price`.
/// A non-positive or non-finite price buys nothing.
pub fn whole_shares_affordable(cash: f64, price: f64) -> f64 {
    if !price.is_finite() || price <= 0.0 || cash.is_nan() || cash <= 0.0 {
        return 0.0;
    }
    let quotient = cash / price;
    let mut shares = quotient.floor();
    // cash / price can round up onto an integer the cash does not cover
    if shares * price > cash {
        shares = (quotient * (1.0 - f64::EPSILON)).floor();
    }
    shares.max(0.0)
}

/// The two account buckets of a share-based strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accounts {
    pub capped: AccountBucket,
    pub taxable: AccountBucket,
}

impl Accounts {
    pub fn get(&self, kind: AccountKind) -> &AccountBucket {
        match kind {
            AccountKind::Capped => &self.capped,
            AccountKind::Taxable => &self.taxable,
        }
    }

    pub fn get_mut(&mut self, kind: AccountKind) -> &mut AccountBucket {
        match kind {
            AccountKind::Capped => &mut self.capped,
            AccountKind::Taxable => &mut self.taxable,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AccountKind, &AccountBucket)> {
        [
            (AccountKind::Capped, &self.capped),
            (AccountKind::Taxable, &self.taxable),
        ]
        .into_iter()
    }

    pub fn total_invested(&self) -> f64 {
        self.capped.cumulative_invested + self.taxable.cumulative_invested
    }
}
