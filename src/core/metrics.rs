use super::types::{RunParameters, StrategyResult, StrategySummary, TaxConfig, TaxationMode};

/// Ratio of net gain to amount invested, e.g. `0.5` for +50 %.
pub fn total_return(exit_value: f64, invested: f64) -> Option<f64> {
    if invested <= 0.0 {
        return None;
    }
    Some((exit_value - invested) / invested)
}

/// Geometric mean yearly return equivalent to `total_return` over `years`.
pub fn annualized_return(total_return: f64, years: f64) -> Option<f64> {
    let growth = 1.0 + total_return;
    if years <= 0.0 || growth <= 0.0 {
        return None;
    }
    Some(growth.powf(1.0 / years) - 1.0)
}

pub fn summarize(result: &StrategyResult, params: &RunParameters, tax: &TaxConfig) -> StrategySummary {
    let months = result.len();
    let total_invested = result.total_invested_cash.last().copied().unwrap_or(0.0);
    let final_portfolio_value = result.portfolio_value.last().copied().unwrap_or(0.0);
    let final_exit_value = result.exit_value.last().copied().unwrap_or(0.0);

    let total = total_return(final_exit_value, total_invested);
    let annualized = total.and_then(|r| annualized_return(r, months as f64 / 12.0));

    StrategySummary {
        months,
        total_invested,
        final_portfolio_value,
        final_exit_value,
        total_return: total,
        annualized_return: annualized,
        cap_exceeded: params.taxation_mode == TaxationMode::CappedAdvantaged
            && total_invested > tax.contribution_cap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn run_params(mode: TaxationMode) -> RunParameters {
        let day = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
        RunParameters {
            initial_lump_sum: 0.0,
            initial_monthly_contribution: 0.0,
            yearly_bump: 0.0,
            start: day,
            end: day,
            taxation_mode: mode,
        }
    }

    fn result_with(months: usize, invested: f64, exit: f64) -> StrategyResult {
        let day = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
        StrategyResult {
            months: vec![day; months],
            monthly_contribution: vec![0.0; months],
            total_invested_cash: vec![invested; months],
            portfolio_value: vec![exit; months],
            exit_value: vec![exit; months],
            capped_invested: vec![0.0; months],
            taxable_invested: vec![invested; months],
            capped_shares: vec![0.0; months],
            taxable_shares: vec![0.0; months],
        }
    }

    #[test]
    fn total_return_is_relative_gain() {
        assert_approx(total_return(15_000.0, 10_000.0).expect("defined"), 0.5);
        assert_approx(total_return(8_000.0, 10_000.0).expect("defined"), -0.2);
        assert_eq!(total_return(100.0, 0.0), None);
    }

    #[test]
    fn annualized_return_is_geometric() {
        assert_approx(annualized_return(0.21, 2.0).expect("defined"), 0.1);
        assert_eq!(annualized_return(0.5, 0.0), None);
        assert_eq!(annualized_return(-1.0, 5.0), None);
    }

    #[test]
    fn summary_reads_final_values() {
        let result = result_with(24, 10_000.0, 12_100.0);
        let summary = summarize(&result, &run_params(TaxationMode::None), &TaxConfig::default());
        assert_eq!(summary.months, 24);
        assert_approx(summary.total_invested, 10_000.0);
        assert_approx(summary.final_exit_value, 12_100.0);
        assert_approx(summary.total_return.expect("defined"), 0.21);
        assert_approx(summary.annualized_return.expect("defined"), 0.1);
        assert!(!summary.cap_exceeded);
    }

    #[test]
    fn summary_flags_principal_above_cap() {
        let result = result_with(12, 200_000.0, 210_000.0);
        let tax = TaxConfig::default();
        assert!(summarize(&result, &run_params(TaxationMode::CappedAdvantaged), &tax).cap_exceeded);
        assert!(!summarize(&result, &run_params(TaxationMode::None), &tax).cap_exceeded);
    }

    #[test]
    fn empty_result_has_no_returns() {
        let summary = summarize(
            &StrategyResult::default(),
            &run_params(TaxationMode::None),
            &TaxConfig::default(),
        );
        assert_eq!(summary.months, 0);
        assert_eq!(summary.total_return, None);
        assert_eq!(summary.annualized_return, None);
    }
}
