use super::types::TaxationMode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub capped: f64,
    pub taxable: f64,
}

/// Splits an amount between the capped account and the taxable account.
/// The capped account takes as much as its remaining capacity allows and the
/// overflow goes to the taxable account. With no taxation the cap is ignored
/// and everything is routed to the taxable account.
pub fn split_contribution(
    mode: TaxationMode,
    cumulative_capped_invested: f64,
    contribution_cap: f64,
    amount: f64,
) -> Allocation {
    let amount = amount.max(0.0);
    match mode {
        TaxationMode::None => Allocation {
            capped: 0.0,
            taxable: amount,
        },
        TaxationMode::CappedAdvantaged => {
            let remaining_capacity = (contribution_cap - cumulative_capped_invested).max(0.0);
            let capped = amount.min(remaining_capacity);
            let taxable = (amount - capped).max(0.0);
            Allocation { capped, taxable }
        }
    }
}
