use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    Instrument, InstrumentKind, InstrumentParameters, MonthlyObservation, RateObservation,
    RunParameters, SeriesData, StrategyResult, StrategySummary, TaxConfig, TaxationMode,
    run_instrument,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliTaxationMode {
    CappedAdvantaged,
    None,
}

impl From<CliTaxationMode> for TaxationMode {
    fn from(value: CliTaxationMode) -> Self {
        match value {
            CliTaxationMode::CappedAdvantaged => TaxationMode::CappedAdvantaged,
            CliTaxationMode::None => TaxationMode::None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliInstrumentKind {
    Equity,
    Gold,
    FixedIncome,
}

impl From<CliInstrumentKind> for InstrumentKind {
    fn from(value: CliInstrumentKind) -> Self {
        match value {
            CliInstrumentKind::Equity => InstrumentKind::Equity,
            CliInstrumentKind::Gold => InstrumentKind::Gold,
            CliInstrumentKind::FixedIncome => InstrumentKind::FixedIncome,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliSeriesFormat {
    Prices,
    Rates,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiTaxationMode {
    #[serde(alias = "cappedAdvantaged", alias = "capped_advantaged", alias = "capped")]
    CappedAdvantaged,
    #[serde(alias = "untaxed")]
    None,
}

impl From<ApiTaxationMode> for CliTaxationMode {
    fn from(value: ApiTaxationMode) -> Self {
        match value {
            ApiTaxationMode::CappedAdvantaged => CliTaxationMode::CappedAdvantaged,
            ApiTaxationMode::None => CliTaxationMode::None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiInstrumentKind {
    #[serde(alias = "stock", alias = "index")]
    Equity,
    Gold,
    #[serde(alias = "fixedIncome", alias = "fixed_income", alias = "savings")]
    FixedIncome,
}

impl From<ApiInstrumentKind> for InstrumentKind {
    fn from(value: ApiInstrumentKind) -> Self {
        match value {
            ApiInstrumentKind::Equity => InstrumentKind::Equity,
            ApiInstrumentKind::Gold => InstrumentKind::Gold,
            ApiInstrumentKind::FixedIncome => InstrumentKind::FixedIncome,
        }
    }
}

/// Run flags shared by every instrument. Rates and fees are in percent.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        long,
        value_parser = parse_month,
        help = "First simulated month (YYYY-MM); defaults to the first month of the series"
    )]
    start: Option<NaiveDate>,
    #[arg(
        long,
        value_parser = parse_month,
        help = "Last simulated month (YYYY-MM); defaults to the last month of the series"
    )]
    end: Option<NaiveDate>,
    #[arg(long, default_value_t = 10000.0, help = "Lump sum invested in the first month")]
    initial_investment: f64,
    #[arg(long, default_value_t = 100.0)]
    monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Added to the monthly contribution every 12 months"
    )]
    yearly_bump: f64,
    #[arg(long, value_enum, default_value_t = CliTaxationMode::CappedAdvantaged)]
    taxation_mode: CliTaxationMode,
    #[arg(
        long,
        default_value_t = 150000.0,
        help = "Lifetime contribution ceiling of the tax-advantaged account"
    )]
    contribution_cap: f64,
    #[arg(
        long,
        default_value_t = 17.2,
        help = "Tax on gains inside the capped account in percent"
    )]
    capped_tax_rate: f64,
    #[arg(
        long,
        default_value_t = 30.0,
        help = "Tax on gains inside the taxable account in percent"
    )]
    taxable_tax_rate: f64,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, help = "JSON array of {\"date\", \"price\"} or {\"date\", \"rate\"} objects")]
    series: PathBuf,
    #[arg(long, value_enum, default_value_t = CliSeriesFormat::Prices)]
    series_format: CliSeriesFormat,
    #[arg(long, value_enum, default_value_t = CliInstrumentKind::Equity)]
    kind: CliInstrumentKind,
    #[arg(long, help = "Label used in the output; defaults to the series file name")]
    name: Option<String>,
    #[arg(long, default_value_t = 0.0, help = "Fee on every purchase in percent")]
    entry_fee: f64,
    #[arg(long, default_value_t = 0.0, help = "Fee on liquidation in percent")]
    exit_fee: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Yearly management fee in percent, already priced into the series"
    )]
    management_fee: f64,
    #[command(flatten)]
    run: RunArgs,
}

/// Validated run inputs with rates converted to fractions. The window stays
/// open until it is resolved against an instrument's series.
#[derive(Debug, Clone, PartialEq)]
struct RunSettings {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    initial_lump_sum: f64,
    initial_monthly_contribution: f64,
    yearly_bump: f64,
    taxation_mode: TaxationMode,
    tax: TaxConfig,
}

impl RunSettings {
    fn params_for(&self, series: &SeriesData) -> Result<RunParameters, String> {
        let (first, last) = series_bounds(series).ok_or_else(|| "series is empty".to_string())?;
        let start = self.start.unwrap_or(first);
        let end = self.end.unwrap_or(last);
        if start > end {
            return Err(format!("--start ({start}) must not be after --end ({end})"));
        }
        Ok(RunParameters {
            initial_lump_sum: self.initial_lump_sum,
            initial_monthly_contribution: self.initial_monthly_contribution,
            yearly_bump: self.yearly_bump,
            start,
            end,
            taxation_mode: self.taxation_mode,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    start: Option<String>,
    end: Option<String>,
    initial_investment: Option<f64>,
    monthly_contribution: Option<f64>,
    yearly_bump: Option<f64>,
    taxation_mode: Option<ApiTaxationMode>,
    contribution_cap: Option<f64>,
    capped_tax_rate: Option<f64>,
    taxable_tax_rate: Option<f64>,
    instruments: Vec<InstrumentPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentPayload {
    name: Option<String>,
    kind: ApiInstrumentKind,
    #[serde(default)]
    entry_fee: f64,
    #[serde(default)]
    exit_fee: f64,
    #[serde(default)]
    management_fee: f64,
    prices: Option<Vec<MonthlyObservation>>,
    rates: Option<Vec<RateObservation>>,
}

#[derive(Debug)]
struct ApiRequest {
    settings: RunSettings,
    instruments: Vec<Instrument>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    name: String,
    kind: InstrumentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<StrategySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<StrategyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl InstrumentResponse {
    fn failed(name: String, kind: InstrumentKind, error: String) -> Self {
        Self {
            name,
            kind,
            start: None,
            end: None,
            summary: None,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    taxation_mode: TaxationMode,
    tax: TaxConfig,
    instruments: Vec<InstrumentResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_month(value: &str) -> Result<NaiveDate, String> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d"))
        .map_err(|_| format!("invalid month `{value}`, expected YYYY-MM or YYYY-MM-DD"))
}

fn series_bounds(series: &SeriesData) -> Option<(NaiveDate, NaiveDate)> {
    match series {
        SeriesData::Prices(prices) => Some((prices.first()?.date, prices.last()?.date)),
        SeriesData::Rates(rates) => Some((rates.first()?.date, rates.last()?.date)),
    }
}

fn build_settings(args: RunArgs) -> Result<RunSettings, String> {
    if !args.initial_investment.is_finite() || args.initial_investment < 0.0 {
        return Err("--initial-investment must be >= 0".to_string());
    }

    if !args.monthly_contribution.is_finite() || args.monthly_contribution < 0.0 {
        return Err("--monthly-contribution must be >= 0".to_string());
    }

    if !args.yearly_bump.is_finite() || args.yearly_bump < 0.0 {
        return Err("--yearly-bump must be >= 0".to_string());
    }

    if !args.contribution_cap.is_finite() || args.contribution_cap < 0.0 {
        return Err("--contribution-cap must be >= 0".to_string());
    }

    for (name, rate) in [
        ("--capped-tax-rate", args.capped_tax_rate),
        ("--taxable-tax-rate", args.taxable_tax_rate),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    if let (Some(start), Some(end)) = (args.start, args.end) {
        if start > end {
            return Err("--end must not precede --start".to_string());
        }
    }

    Ok(RunSettings {
        start: args.start,
        end: args.end,
        initial_lump_sum: args.initial_investment,
        initial_monthly_contribution: args.monthly_contribution,
        yearly_bump: args.yearly_bump,
        taxation_mode: args.taxation_mode.into(),
        tax: TaxConfig {
            contribution_cap: args.contribution_cap,
            capped_account_tax_rate: args.capped_tax_rate / 100.0,
            taxable_account_tax_rate: args.taxable_tax_rate / 100.0,
        },
    })
}

fn build_fees(entry_fee: f64, exit_fee: f64, management_fee: f64) -> Result<InstrumentParameters, String> {
    for (name, fee) in [
        ("--entry-fee", entry_fee),
        ("--exit-fee", exit_fee),
        ("--management-fee", management_fee),
    ] {
        if !fee.is_finite() || !(0.0..100.0).contains(&fee) {
            return Err(format!("{name} must be >= 0 and < 100"));
        }
    }
    Ok(InstrumentParameters {
        entry_fee: entry_fee / 100.0,
        exit_fee: exit_fee / 100.0,
        yearly_management_fee: management_fee / 100.0,
    })
}

fn default_args_for_api() -> RunArgs {
    RunArgs {
        start: None,
        end: None,
        initial_investment: 10_000.0,
        monthly_contribution: 100.0,
        yearly_bump: 0.0,
        taxation_mode: CliTaxationMode::CappedAdvantaged,
        contribution_cap: 150_000.0,
        capped_tax_rate: 17.2,
        taxable_tax_rate: 30.0,
    }
}

fn evaluate_instrument(settings: &RunSettings, instrument: &Instrument) -> InstrumentResponse {
    let params = match settings.params_for(&instrument.series) {
        Ok(params) => params,
        Err(msg) => return InstrumentResponse::failed(instrument.name.clone(), instrument.kind, msg),
    };

    match run_instrument(instrument, &params, &settings.tax) {
        Ok(outcome) => InstrumentResponse {
            name: instrument.name.clone(),
            kind: instrument.kind,
            start: Some(params.start),
            end: Some(params.end),
            summary: Some(outcome.summary),
            result: Some(outcome.result),
            error: None,
        },
        Err(err) => {
            warn!(name = %instrument.name, error = %err, "strategy run rejected");
            InstrumentResponse::failed(instrument.name.clone(), instrument.kind, err.to_string())
        }
    }
}

/// Runs every instrument on its own blocking task. Runs share nothing but the
/// read-only settings, so one failing instrument leaves the others intact.
async fn compare(settings: RunSettings, instruments: Vec<Instrument>) -> Vec<InstrumentResponse> {
    let settings = Arc::new(settings);
    let tasks: Vec<_> = instruments
        .into_iter()
        .map(|instrument| {
            let settings = Arc::clone(&settings);
            let name = instrument.name.clone();
            let kind = instrument.kind;
            let handle =
                tokio::task::spawn_blocking(move || evaluate_instrument(&settings, &instrument));
            (name, kind, handle)
        })
        .collect();

    let mut responses = Vec::with_capacity(tasks.len());
    for (name, kind, handle) in tasks {
        let response = match handle.await {
            Ok(response) => response,
            Err(err) => InstrumentResponse::failed(name, kind, format!("simulation task failed: {err}")),
        };
        responses.push(response);
    }
    responses
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/compare", post(compare_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "DCA simulation API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) if request.instruments.len() == 1 => request,
        Ok(request) => {
            let msg = format!(
                "/api/simulate expects exactly one instrument, got {}; use /api/compare",
                request.instruments.len()
            );
            return rejected(msg);
        }
        Err(msg) => return rejected(msg),
    };

    info!(instrument = %request.instruments[0].name, "simulate request");
    let mut responses = compare(request.settings, request.instruments).await;
    match responses.pop() {
        Some(response) if response.error.is_none() => json_response(StatusCode::OK, response),
        Some(response) => json_response(StatusCode::BAD_REQUEST, response),
        None => error_response(StatusCode::INTERNAL_SERVER_ERROR, "no simulation result"),
    }
}

async fn compare_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) if !request.instruments.is_empty() => request,
        Ok(_) => return rejected("at least one instrument is required".to_string()),
        Err(msg) => return rejected(msg),
    };

    info!(instruments = request.instruments.len(), "compare request");
    let taxation_mode = request.settings.taxation_mode;
    let tax = request.settings.tax;
    let instruments = compare(request.settings, request.instruments).await;
    json_response(
        StatusCode::OK,
        CompareResponse {
            taxation_mode,
            tax,
            instruments,
        },
    )
}

fn rejected(msg: String) -> Response {
    warn!(error = %msg, "request rejected");
    error_response(StatusCode::BAD_REQUEST, &msg)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.start {
        args.start = Some(parse_month(&v).map_err(|e| format!("start: {e}"))?);
    }
    if let Some(v) = payload.end {
        args.end = Some(parse_month(&v).map_err(|e| format!("end: {e}"))?);
    }
    if let Some(v) = payload.initial_investment {
        args.initial_investment = v;
    }
    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.yearly_bump {
        args.yearly_bump = v;
    }
    if let Some(v) = payload.taxation_mode {
        args.taxation_mode = v.into();
    }
    if let Some(v) = payload.contribution_cap {
        args.contribution_cap = v;
    }
    if let Some(v) = payload.capped_tax_rate {
        args.capped_tax_rate = v;
    }
    if let Some(v) = payload.taxable_tax_rate {
        args.taxable_tax_rate = v;
    }

    let settings = build_settings(args)?;
    let instruments = payload
        .instruments
        .into_iter()
        .enumerate()
        .map(|(idx, instrument)| instrument_from_payload(idx, instrument))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ApiRequest {
        settings,
        instruments,
    })
}

fn instrument_from_payload(idx: usize, payload: InstrumentPayload) -> Result<Instrument, String> {
    let kind: InstrumentKind = payload.kind.into();
    let name = payload
        .name
        .unwrap_or_else(|| format!("instrument-{}", idx + 1));
    let fees = build_fees(payload.entry_fee, payload.exit_fee, payload.management_fee)
        .map_err(|e| format!("{name}: {e}"))?;
    let series = match (payload.prices, payload.rates) {
        (Some(prices), None) => SeriesData::Prices(prices),
        (None, Some(rates)) => SeriesData::Rates(rates),
        _ => return Err(format!("{name}: exactly one of `prices` or `rates` is required")),
    };
    Ok(Instrument {
        name,
        kind,
        fees,
        series,
    })
}

/// Reads a series file, runs one strategy and returns the JSON report.
pub fn run_simulate_command(args: SimulateArgs) -> Result<String, String> {
    let raw = std::fs::read_to_string(&args.series)
        .map_err(|e| format!("cannot read --series {}: {e}", args.series.display()))?;
    let series = match args.series_format {
        CliSeriesFormat::Prices => SeriesData::Prices(
            serde_json::from_str(&raw).map_err(|e| format!("invalid price series: {e}"))?,
        ),
        CliSeriesFormat::Rates => SeriesData::Rates(
            serde_json::from_str(&raw).map_err(|e| format!("invalid rate series: {e}"))?,
        ),
    };
    let name = args.name.unwrap_or_else(|| {
        args.series
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "series".to_string())
    });
    let instrument = Instrument {
        name,
        kind: args.kind.into(),
        fees: build_fees(args.entry_fee, args.exit_fee, args.management_fee)?,
        series,
    };
    let settings = build_settings(args.run)?;

    let response = evaluate_instrument(&settings, &instrument);
    if let Some(err) = &response.error {
        return Err(err.clone());
    }
    serde_json::to_string_pretty(&response).map_err(|e| format!("cannot serialize result: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monthly_dates;
    use std::fs;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_args() -> RunArgs {
        default_args_for_api()
    }

    fn ym(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).expect("valid date")
    }

    fn price_json(start: NaiveDate, prices: &[f64]) -> String {
        let rows: Vec<String> = monthly_dates(start, prices.len())
            .into_iter()
            .zip(prices)
            .map(|(date, price)| format!(r#"{{"date": "{date}", "price": {price}}}"#))
            .collect();
        format!("[{}]", rows.join(", "))
    }

    fn flat_instrument(name: &str, kind: InstrumentKind, months: usize) -> Instrument {
        Instrument {
            name: name.to_string(),
            kind,
            fees: InstrumentParameters::default(),
            series: SeriesData::Prices(
                monthly_dates(ym(2000, 1), months)
                    .into_iter()
                    .map(|date| MonthlyObservation { date, price: 1.0 })
                    .collect(),
            ),
        }
    }

    #[test]
    fn parse_month_accepts_year_month_and_full_dates() {
        assert_eq!(parse_month("1994-01"), Ok(ym(1994, 1)));
        assert_eq!(parse_month("1994-01-15"), Ok(NaiveDate::from_ymd_opt(1994, 1, 15).expect("valid date")));
        assert!(parse_month("1994").is_err());
        assert!(parse_month("1994-13").is_err());
    }

    #[test]
    fn build_settings_converts_percentages() {
        let settings = build_settings(sample_args()).expect("valid settings");
        assert_approx(settings.tax.capped_account_tax_rate, 0.172);
        assert_approx(settings.tax.taxable_account_tax_rate, 0.30);
        assert_approx(settings.tax.contribution_cap, 150_000.0);
        assert_eq!(settings.taxation_mode, TaxationMode::CappedAdvantaged);
    }

    #[test]
    fn build_settings_rejects_negative_contribution() {
        let mut args = sample_args();
        args.monthly_contribution = -1.0;
        let err = build_settings(args).expect_err("must reject negative contribution");
        assert!(err.contains("--monthly-contribution"));
    }

    #[test]
    fn build_settings_rejects_out_of_range_tax_rate() {
        let mut args = sample_args();
        args.taxable_tax_rate = 120.0;
        let err = build_settings(args).expect_err("must reject tax rate above 100");
        assert!(err.contains("--taxable-tax-rate"));
    }

    #[test]
    fn build_settings_rejects_inverted_window() {
        let mut args = sample_args();
        args.start = Some(ym(2010, 1));
        args.end = Some(ym(2000, 1));
        let err = build_settings(args).expect_err("must reject end before start");
        assert!(err.contains("--end"));
    }

    #[test]
    fn build_fees_rejects_negative_fee() {
        let err = build_fees(-0.5, 0.0, 0.0).expect_err("must reject negative fee");
        assert!(err.contains("--entry-fee"));
        let fees = build_fees(0.5, 1.0, 0.2).expect("valid fees");
        assert_approx(fees.entry_fee, 0.005);
        assert_approx(fees.exit_fee, 0.01);
        assert_approx(fees.yearly_management_fee, 0.002);
    }

    #[test]
    fn window_defaults_to_series_bounds() {
        let settings = build_settings(sample_args()).expect("valid settings");
        let instrument = flat_instrument("flat", InstrumentKind::Equity, 6);
        let params = settings.params_for(&instrument.series).expect("resolvable window");
        assert_eq!(params.start, ym(2000, 1));
        assert_eq!(params.end, ym(2000, 6));

        let empty = SeriesData::Rates(Vec::new());
        assert!(settings.params_for(&empty).is_err());
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = format!(
            r#"{{
              "start": "2000-02",
              "end": "2000-05",
              "initialInvestment": 5000,
              "monthlyContribution": 250,
              "yearlyBump": 20,
              "taxationMode": "none",
              "contributionCap": 100000,
              "cappedTaxRate": 15,
              "taxableTaxRate": 25,
              "instruments": [
                {{"name": "S&P500", "kind": "equity", "entryFee": 0.5, "prices": {prices}}},
                {{"kind": "fixed-income", "rates": [{{"date": "2000-01-01", "rate": 0.001}}]}}
              ]
            }}"#,
            prices = price_json(ym(2000, 1), &[1.0, 1.1, 1.2, 1.3, 1.4, 1.5])
        );
        let request = api_request_from_json(&json).expect("json should parse");
        let settings = request.settings;

        assert_eq!(settings.start, Some(ym(2000, 2)));
        assert_eq!(settings.end, Some(ym(2000, 5)));
        assert_approx(settings.initial_lump_sum, 5_000.0);
        assert_approx(settings.initial_monthly_contribution, 250.0);
        assert_approx(settings.yearly_bump, 20.0);
        assert_eq!(settings.taxation_mode, TaxationMode::None);
        assert_approx(settings.tax.contribution_cap, 100_000.0);
        assert_approx(settings.tax.capped_account_tax_rate, 0.15);
        assert_approx(settings.tax.taxable_account_tax_rate, 0.25);

        assert_eq!(request.instruments.len(), 2);
        assert_eq!(request.instruments[0].name, "S&P500");
        assert_eq!(request.instruments[0].kind, InstrumentKind::Equity);
        assert_approx(request.instruments[0].fees.entry_fee, 0.005);
        assert_eq!(request.instruments[1].name, "instrument-2");
        assert_eq!(request.instruments[1].kind, InstrumentKind::FixedIncome);
        assert!(matches!(request.instruments[1].series, SeriesData::Rates(_)));
    }

    #[test]
    fn api_request_requires_exactly_one_series_per_instrument() {
        let json = r#"{"instruments": [{"name": "gold", "kind": "gold"}]}"#;
        let err = api_request_from_json(json).expect_err("must reject instrument without data");
        assert!(err.contains("gold"));
        assert!(err.contains("prices"));
    }

    #[test]
    fn api_request_rejects_bad_month() {
        let json = r#"{"start": "January", "instruments": []}"#;
        let err = api_request_from_json(json).expect_err("must reject bad month");
        assert!(err.starts_with("start:"));
    }

    #[tokio::test]
    async fn compare_isolates_failing_instruments() {
        let mut args = sample_args();
        args.taxation_mode = CliTaxationMode::None;
        args.start = Some(ym(2000, 1));
        let settings = build_settings(args).expect("valid settings");

        let mut broken = flat_instrument("broken", InstrumentKind::Gold, 12);
        if let SeriesData::Prices(prices) = &mut broken.series {
            prices[4].price = 0.0;
        }
        let instruments = vec![
            flat_instrument("equity", InstrumentKind::Equity, 12),
            broken,
            flat_instrument("savings", InstrumentKind::FixedIncome, 12),
        ];

        let responses = compare(settings, instruments).await;
        assert_eq!(responses.len(), 3);

        assert_eq!(responses[0].name, "equity");
        let summary = responses[0].summary.expect("equity succeeds");
        assert_approx(summary.total_invested, 11_200.0);
        assert_approx(summary.final_exit_value, 11_200.0);

        assert!(responses[1].summary.is_none());
        let err = responses[1].error.as_deref().expect("broken series fails");
        assert!(err.contains("non-positive price"));

        let savings = responses[2].summary.expect("savings succeeds");
        assert_approx(savings.final_exit_value, 11_200.0);
    }

    #[test]
    fn instrument_response_serialization_contains_expected_fields() {
        let settings = build_settings(sample_args()).expect("valid settings");
        let response = evaluate_instrument(&settings, &flat_instrument("flat", InstrumentKind::Equity, 3));
        let value = serde_json::to_value(&response).expect("serializable");

        assert_eq!(value["name"], "flat");
        assert_eq!(value["kind"], "equity");
        assert_eq!(value["start"], "2000-01-01");
        assert!(value.get("error").is_none());
        for key in ["monthlyContribution", "totalInvestedCash", "portfolioValue", "exitValue"] {
            assert_eq!(value["result"][key].as_array().map(Vec::len), Some(3), "{key}");
        }
        assert_eq!(value["summary"]["months"], 3);
        assert_eq!(value["summary"]["capExceeded"], false);
    }

    #[test]
    fn simulate_command_reads_series_file() {
        let dir = std::env::temp_dir().join(format!("dca-cli-test-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("doubling.json");
        fs::write(&path, price_json(ym(2000, 1), &[10.0, 20.0])).expect("write series");

        let mut run = sample_args();
        run.monthly_contribution = 0.0;
        run.contribution_cap = 0.0;
        let args = SimulateArgs {
            series: path.clone(),
            series_format: CliSeriesFormat::Prices,
            kind: CliInstrumentKind::Equity,
            name: None,
            entry_fee: 0.0,
            exit_fee: 0.0,
            management_fee: 0.0,
            run,
        };
        let output = run_simulate_command(args).expect("command succeeds");
        let value: serde_json::Value = serde_json::from_str(&output).expect("json output");

        assert_eq!(value["name"], "doubling");
        let exit = value["summary"]["finalExitValue"].as_f64().expect("number");
        assert_approx(exit, 17_000.0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn simulate_command_reports_missing_file() {
        let args = SimulateArgs {
            series: PathBuf::from("/nonexistent/series.json"),
            series_format: CliSeriesFormat::Rates,
            kind: CliInstrumentKind::FixedIncome,
            name: None,
            entry_fee: 0.0,
            exit_fee: 0.0,
            management_fee: 0.0,
            run: sample_args(),
        };
        let err = run_simulate_command(args).expect_err("missing file");
        assert!(err.contains("--series"));
    }
}
