use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{ArgAction, Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    BreakEvenHorizon, ConfigurationMode, CostSchedule, EngineConfig, FanChartYear,
    GrowthSolveConfig, GrowthSolveResult, HorizonSpec, HraRule, Inputs, LoanTerms,
    MAX_HISTOGRAM_BINS, MAX_HORIZON_YEARS, MAX_SIMULATIONS, MAX_SWEEP_POINTS, MarketAssumptions,
    MonteCarloConfig, MonteCarloSummary, NpvError, NpvResult, Overrides, RentInitialOutlay,
    RentPathOptions, ResaleOutcome, ScenarioRow, SensitivityCurve, SweepConfig, TaxRegime,
    YearOneBreakdown, break_even_horizon, build_cash_flows, compute_npv, run_fan_chart,
    run_monte_carlo, scenario_table, sensitivity_sweep, solve_break_even_growth,
    year_one_breakdown,
};

/// Holding period used for "hold for a lifetime".
const LIFETIME_HOLD_YEARS: u32 = 60;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliMode {
    Simple,
    IndiaRealWorld,
}

impl From<CliMode> for ConfigurationMode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Simple => ConfigurationMode::Simple,
            CliMode::IndiaRealWorld => ConfigurationMode::IndiaRealWorld,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRentOutlay {
    MirrorBuy,
    Zero,
}

impl From<CliRentOutlay> for RentInitialOutlay {
    fn from(value: CliRentOutlay) -> Self {
        match value {
            CliRentOutlay::MirrorBuy => RentInitialOutlay::MirrorBuy,
            CliRentOutlay::Zero => RentInitialOutlay::Zero,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiMode {
    Simple,
    IndiaRealWorld,
}

impl From<ApiMode> for CliMode {
    fn from(value: ApiMode) -> Self {
        match value {
            ApiMode::Simple => CliMode::Simple,
            ApiMode::IndiaRealWorld => CliMode::IndiaRealWorld,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRentOutlay {
    MirrorBuy,
    Zero,
}

impl From<ApiRentOutlay> for CliRentOutlay {
    fn from(value: ApiRentOutlay) -> Self {
        match value {
            ApiRentOutlay::MirrorBuy => CliRentOutlay::MirrorBuy,
            ApiRentOutlay::Zero => CliRentOutlay::Zero,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnalysisPayload {
    price: Option<f64>,
    down_payment: Option<f64>,
    interest_rate: Option<f64>,
    loan_term_years: Option<u32>,

    monthly_rent: Option<f64>,
    rent_growth: Option<f64>,
    house_growth: Option<f64>,
    discount_rate: Option<f64>,
    investment_return: Option<f64>,
    inflation: Option<f64>,
    inflation_adjusted: Option<bool>,

    years_before_sale: Option<u32>,
    hold_to_maturity: Option<bool>,
    lifetime: Option<bool>,

    buy_commission: Option<f64>,
    stamp_duty: Option<f64>,
    fixed_fees: Option<f64>,
    monthly_costs: Option<f64>,
    sell_commission: Option<f64>,

    mode: Option<ApiMode>,
    rent_initial_outlay: Option<ApiRentOutlay>,
    seed_investment: Option<bool>,
    invest_difference: Option<bool>,

    marginal_tax_rate: Option<f64>,
    interest_deduction_cap: Option<f64>,
    principal_deduction_cap: Option<f64>,
    capital_gains_rate: Option<f64>,
    hra_received: Option<f64>,
    basic_salary: Option<f64>,
    metro: Option<bool>,

    scenario_delta: Option<f64>,
    sweep_min: Option<f64>,
    sweep_max: Option<f64>,
    sweep_points: Option<u32>,

    simulations: Option<u32>,
    seed: Option<u64>,
    house_growth_sd: Option<f64>,
    rent_growth_sd: Option<f64>,
    growth_correlation: Option<f64>,
    histogram_bins: Option<u32>,
    fan_chart_years: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "buy_vs_rent",
    about = "Buy vs rent NPV comparison (scenarios, sensitivity, break-even and Monte Carlo)"
)]
struct Cli {
    #[arg(long, default_value_t = 1_500_000.0, help = "House price")]
    price: f64,
    #[arg(long, default_value_t = 20.0, help = "Down payment in percent of price")]
    down_payment: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual loan interest rate in percent")]
    interest_rate: f64,
    #[arg(long, default_value_t = 30)]
    loan_term_years: u32,
    #[arg(long, default_value_t = 4_000.0, help = "Starting monthly rent")]
    monthly_rent: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        allow_negative_numbers = true,
        help = "Annual rent growth in percent"
    )]
    rent_growth: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        allow_negative_numbers = true,
        help = "Annual house price growth in percent"
    )]
    house_growth: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Annual discount rate (opportunity cost of capital) in percent"
    )]
    discount_rate: f64,
    #[arg(
        long,
        help = "Annual return on the renter's invested balance in percent, defaults to discount-rate"
    )]
    investment_return: Option<f64>,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Expected annual inflation in percent"
    )]
    inflation: Option<f64>,
    #[arg(
        long,
        help = "Discount at the real rate derived from --discount-rate and --inflation"
    )]
    inflation_adjusted: bool,
    #[arg(long, default_value_t = 10, help = "Years until the house is sold")]
    years_before_sale: u32,
    #[arg(long, help = "Hold the house until the loan matures, without selling")]
    hold_to_maturity: bool,
    #[arg(long, help = "Hold the house for a lifetime, without selling")]
    lifetime: bool,
    #[arg(long, default_value_t = 1.0, help = "Buy commission in percent of price")]
    buy_commission: f64,
    #[arg(long, default_value_t = 3.0, help = "Stamp duty in percent of price")]
    stamp_duty: f64,
    #[arg(long, default_value_t = 8_000.0, help = "Fixed registration and legal fees")]
    fixed_fees: f64,
    #[arg(
        long,
        default_value_t = 450.0,
        help = "Monthly maintenance, insurance and property tax"
    )]
    monthly_costs: f64,
    #[arg(long, default_value_t = 1.0, help = "Sell commission in percent of sale price")]
    sell_commission: f64,
    #[arg(long, value_enum, default_value_t = CliMode::Simple)]
    mode: CliMode,
    #[arg(
        long,
        value_enum,
        default_value_t = CliRentOutlay::MirrorBuy,
        help = "Whether the renter pays the buyer's up-front outlay at month zero"
    )]
    rent_initial_outlay: CliRentOutlay,
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        help = "Start the renter's invested balance at the buyer's up-front outlay"
    )]
    seed_investment: bool,
    #[arg(
        long,
        help = "Invest the monthly installment minus rent on the rent path (SIP)"
    )]
    invest_difference: bool,
    #[arg(
        long,
        default_value_t = 30.0,
        help = "Marginal income tax rate in percent (india-real-world)"
    )]
    marginal_tax_rate: f64,
    #[arg(
        long,
        default_value_t = 200_000.0,
        help = "Annual cap on deductible home loan interest"
    )]
    interest_deduction_cap: f64,
    #[arg(
        long,
        default_value_t = 150_000.0,
        help = "Annual cap on deductible principal repayment"
    )]
    principal_deduction_cap: f64,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Capital gains tax rate on the resale gain in percent"
    )]
    capital_gains_rate: f64,
    #[arg(long, help = "Monthly house rent allowance received")]
    hra_received: Option<f64>,
    #[arg(long, help = "Monthly basic salary; required with --hra-received")]
    basic_salary: Option<f64>,
    #[arg(long, help = "Rented home is in a metro city (50% HRA limit instead of 40%)")]
    metro: bool,
    #[arg(
        long,
        default_value_t = 1.0,
        help = "House growth shift for the boom and crash scenarios in percent"
    )]
    scenario_delta: f64,
    #[arg(long, default_value_t = -5.0, allow_negative_numbers = true)]
    sweep_min: f64,
    #[arg(long, default_value_t = 8.0, allow_negative_numbers = true)]
    sweep_max: f64,
    #[arg(long, default_value_t = 40)]
    sweep_points: u32,
    #[arg(long, help = "Also run the Monte Carlo simulation and fan chart")]
    monte_carlo: bool,
    #[arg(long, default_value_t = 500)]
    simulations: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(
        long,
        default_value_t = 1.0,
        help = "House growth standard deviation in percentage points"
    )]
    house_growth_sd: f64,
    #[arg(
        long,
        default_value_t = 1.0,
        help = "Rent growth standard deviation in percentage points"
    )]
    rent_growth_sd: f64,
    #[arg(
        long,
        default_value_t = 0.4,
        allow_negative_numbers = true,
        help = "Correlation between house and rent growth draws"
    )]
    growth_correlation: f64,
    #[arg(long, default_value_t = 20)]
    histogram_bins: u32,
    #[arg(long, help = "Longest holding period in the fan chart, defaults to loan term")]
    fan_chart_years: Option<u32>,
}

#[derive(Copy, Clone, Debug)]
struct AnalysisOptions {
    scenario_delta: f64,
    sweep: SweepConfig,
    monte_carlo: MonteCarloConfig,
    seed: u64,
    fan_chart_years: u32,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: Inputs,
    options: AnalysisOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GrowthSolveResponse {
    break_even_growth: Option<f64>,
    converged: bool,
    feasible: bool,
    iterations: usize,
    message: String,
}

impl From<GrowthSolveResult> for GrowthSolveResponse {
    fn from(value: GrowthSolveResult) -> Self {
        Self {
            break_even_growth: value.break_even_growth,
            converged: value.converged,
            feasible: value.feasible,
            iterations: value.iterations.len(),
            message: value.message,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    installment: f64,
    loan_principal: f64,
    year_one: YearOneBreakdown,
    base: NpvResult,
    resale: Option<ResaleOutcome>,
    scenarios: Vec<ScenarioRow>,
    sensitivity: SensitivityCurve,
    break_even_horizon: BreakEvenHorizon,
    break_even_growth: GrowthSolveResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonteCarloResponse {
    seed: u64,
    summary: MonteCarloSummary,
    fan_chart: Vec<FanChartYear>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CliReport {
    #[serde(flatten)]
    compare: CompareResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    monte_carlo: Option<MonteCarloResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: &Cli) -> Result<Inputs, String> {
    if !cli.price.is_finite() || cli.price <= 0.0 {
        return Err("--price must be > 0".to_string());
    }

    if !(0.0..100.0).contains(&cli.down_payment) {
        return Err("--down-payment must be >= 0 and < 100".to_string());
    }

    if !cli.interest_rate.is_finite() || cli.interest_rate < 0.0 {
        return Err("--interest-rate must be >= 0".to_string());
    }

    if cli.loan_term_years == 0 {
        return Err("--loan-term-years must be >= 1".to_string());
    }

    if cli.loan_term_years > MAX_HORIZON_YEARS {
        return Err(format!("--loan-term-years must be <= {MAX_HORIZON_YEARS}"));
    }

    if !cli.monthly_rent.is_finite() || cli.monthly_rent < 0.0 {
        return Err("--monthly-rent must be >= 0".to_string());
    }

    for (flag, rate) in [
        ("--rent-growth", Some(cli.rent_growth)),
        ("--house-growth", Some(cli.house_growth)),
        ("--discount-rate", Some(cli.discount_rate)),
        ("--investment-return", cli.investment_return),
        ("--inflation", cli.inflation),
    ] {
        if let Some(rate) = rate {
            if !rate.is_finite() || rate <= -100.0 {
                return Err(format!("{flag} must be > -100"));
            }
        }
    }

    if cli.inflation_adjusted && cli.inflation.is_none() {
        return Err("--inflation is required when --inflation-adjusted is set".to_string());
    }

    if cli.lifetime && cli.hold_to_maturity {
        return Err("--lifetime cannot be combined with --hold-to-maturity".to_string());
    }

    if !cli.lifetime && !cli.hold_to_maturity {
        if cli.years_before_sale == 0 {
            return Err("--years-before-sale must be >= 1".to_string());
        }
        if cli.years_before_sale > MAX_HORIZON_YEARS {
            return Err(format!("--years-before-sale must be <= {MAX_HORIZON_YEARS}"));
        }
    }

    for (flag, pct) in [
        ("--buy-commission", cli.buy_commission),
        ("--stamp-duty", cli.stamp_duty),
        ("--sell-commission", cli.sell_commission),
        ("--marginal-tax-rate", cli.marginal_tax_rate),
        ("--capital-gains-rate", cli.capital_gains_rate),
    ] {
        if !(0.0..=100.0).contains(&pct) {
            return Err(format!("{flag} must be between 0 and 100"));
        }
    }

    for (flag, amount) in [
        ("--fixed-fees", cli.fixed_fees),
        ("--monthly-costs", cli.monthly_costs),
        ("--interest-deduction-cap", cli.interest_deduction_cap),
        ("--principal-deduction-cap", cli.principal_deduction_cap),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("{flag} must be >= 0"));
        }
    }

    let hra = match cli.hra_received {
        Some(received) => {
            if !received.is_finite() || received < 0.0 {
                return Err("--hra-received must be >= 0".to_string());
            }
            let Some(basic) = cli.basic_salary else {
                return Err("--basic-salary is required when --hra-received is set".to_string());
            };
            if !basic.is_finite() || basic < 0.0 {
                return Err("--basic-salary must be >= 0".to_string());
            }
            Some(HraRule {
                monthly_hra_received: received,
                monthly_basic_salary: basic,
                metro: cli.metro,
            })
        }
        None => None,
    };

    let mode = ConfigurationMode::from(cli.mode);
    let tax = match mode {
        ConfigurationMode::IndiaRealWorld => Some(TaxRegime {
            marginal_rate: cli.marginal_tax_rate / 100.0,
            interest_deduction_cap: cli.interest_deduction_cap,
            principal_deduction_cap: cli.principal_deduction_cap,
            capital_gains_rate: cli.capital_gains_rate / 100.0,
            hra,
        }),
        ConfigurationMode::Simple => None,
    };

    let horizon = if cli.lifetime {
        HorizonSpec::Hold {
            years: Some(LIFETIME_HOLD_YEARS),
        }
    } else if cli.hold_to_maturity {
        HorizonSpec::Hold { years: None }
    } else {
        HorizonSpec::SellAfter {
            years: cli.years_before_sale,
        }
    };

    Ok(Inputs {
        loan: LoanTerms {
            price: cli.price,
            down_payment_fraction: cli.down_payment / 100.0,
            annual_rate: cli.interest_rate / 100.0,
            term_years: cli.loan_term_years,
        },
        market: MarketAssumptions {
            monthly_rent: cli.monthly_rent,
            rent_growth: cli.rent_growth / 100.0,
            house_growth: cli.house_growth / 100.0,
            discount_rate: cli.discount_rate / 100.0,
            investment_return: cli.investment_return.unwrap_or(cli.discount_rate) / 100.0,
            inflation: cli.inflation.map(|v| v / 100.0),
        },
        horizon,
        costs: CostSchedule {
            buy_commission: cli.buy_commission / 100.0,
            stamp_duty: cli.stamp_duty / 100.0,
            fixed_fees: cli.fixed_fees,
            monthly_carrying_cost: cli.monthly_costs,
            sell_commission: cli.sell_commission / 100.0,
        },
        tax,
        config: EngineConfig {
            mode,
            rent_path: RentPathOptions {
                initial_outlay: cli.rent_initial_outlay.into(),
                seed_investment: cli.seed_investment,
                invest_difference: cli.invest_difference,
            },
            inflation_adjusted: cli.inflation_adjusted,
        },
    })
}

fn build_options(cli: &Cli) -> Result<AnalysisOptions, String> {
    if !cli.scenario_delta.is_finite() || cli.scenario_delta < 0.0 {
        return Err("--scenario-delta must be >= 0".to_string());
    }

    if !cli.sweep_min.is_finite() || !cli.sweep_max.is_finite() || cli.sweep_max <= cli.sweep_min
    {
        return Err("--sweep-max must be > --sweep-min".to_string());
    }

    if cli.sweep_min <= -100.0 {
        return Err("--sweep-min must be > -100".to_string());
    }

    if cli.sweep_points < 2 {
        return Err("--sweep-points must be >= 2".to_string());
    }

    if cli.sweep_points > MAX_SWEEP_POINTS {
        return Err(format!("--sweep-points must be <= {MAX_SWEEP_POINTS}"));
    }

    if cli.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }

    if cli.simulations > MAX_SIMULATIONS {
        return Err(format!("--simulations must be <= {MAX_SIMULATIONS}"));
    }

    if !cli.house_growth_sd.is_finite() || cli.house_growth_sd < 0.0 {
        return Err("--house-growth-sd must be >= 0".to_string());
    }

    if !cli.rent_growth_sd.is_finite() || cli.rent_growth_sd < 0.0 {
        return Err("--rent-growth-sd must be >= 0".to_string());
    }

    if !(-1.0..=1.0).contains(&cli.growth_correlation) {
        return Err("--growth-correlation must be between -1 and 1".to_string());
    }

    if cli.histogram_bins == 0 {
        return Err("--histogram-bins must be > 0".to_string());
    }

    if cli.histogram_bins > MAX_HISTOGRAM_BINS {
        return Err(format!("--histogram-bins must be <= {MAX_HISTOGRAM_BINS}"));
    }

    let fan_chart_years = cli.fan_chart_years.unwrap_or(cli.loan_term_years);
    if fan_chart_years == 0 {
        return Err("--fan-chart-years must be >= 1".to_string());
    }

    if fan_chart_years > MAX_HORIZON_YEARS {
        return Err(format!("--fan-chart-years must be <= {MAX_HORIZON_YEARS}"));
    }

    Ok(AnalysisOptions {
        scenario_delta: cli.scenario_delta / 100.0,
        sweep: SweepConfig {
            min: cli.sweep_min / 100.0,
            max: cli.sweep_max / 100.0,
            points: cli.sweep_points,
        },
        monte_carlo: MonteCarloConfig {
            simulations: cli.simulations,
            house_growth_sd: cli.house_growth_sd / 100.0,
            rent_growth_sd: cli.rent_growth_sd / 100.0,
            correlation: cli.growth_correlation,
            histogram_bins: cli.histogram_bins,
        },
        seed: cli.seed,
        fan_chart_years,
    })
}

fn build_request(cli: &Cli) -> Result<ApiRequest, String> {
    Ok(ApiRequest {
        inputs: build_inputs(cli)?,
        options: build_options(cli)?,
    })
}

/// Parses CLI flags and renders the comparison report as pretty JSON.
///
/// Flag parse failures, including `--help`, come back as `Err` with clap's rendered text.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;
    let request = build_request(&cli)?;

    let compare = build_compare_response(&request).map_err(|e| e.to_string())?;
    let monte_carlo = if cli.monte_carlo {
        Some(build_monte_carlo_response(&request).map_err(|e| e.to_string())?)
    } else {
        None
    };

    serde_json::to_string_pretty(&CliReport {
        compare,
        monte_carlo,
    })
    .map_err(|e| format!("Failed to render report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .route(
            "/api/monte-carlo",
            get(monte_carlo_get_handler).post(monte_carlo_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "buy vs rent HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn compare_get_handler(
    payload: Result<Query<AnalysisPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => compare_handler_impl(payload).await,
        Err(rejection) => reject(&format!("Invalid query string: {rejection}")),
    }
}

async fn compare_post_handler(payload: Result<Json<AnalysisPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => compare_handler_impl(payload).await,
        Err(rejection) => reject(&format!("Invalid API JSON payload: {rejection}")),
    }
}

async fn monte_carlo_get_handler(
    payload: Result<Query<AnalysisPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => monte_carlo_handler_impl(payload).await,
        Err(rejection) => reject(&format!("Invalid query string: {rejection}")),
    }
}

async fn monte_carlo_post_handler(
    payload: Result<Json<AnalysisPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => monte_carlo_handler_impl(payload).await,
        Err(rejection) => reject(&format!("Invalid API JSON payload: {rejection}")),
    }
}

async fn compare_handler_impl(payload: AnalysisPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return reject(&msg),
    };

    match build_compare_response(&request) {
        Ok(response) => {
            info!(
                advantage = response.base.advantage,
                months = response.base.months,
                "compare request served"
            );
            json_response(StatusCode::OK, response)
        }
        Err(e) => reject(&e.to_string()),
    }
}

async fn monte_carlo_handler_impl(payload: AnalysisPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return reject(&msg),
    };

    match build_monte_carlo_response(&request) {
        Ok(response) => {
            info!(
                simulations = response.summary.simulations,
                probability_buy_wins = response.summary.probability_buy_wins,
                "monte carlo request served"
            );
            json_response(StatusCode::OK, response)
        }
        Err(e) => reject(&e.to_string()),
    }
}

fn reject(msg: &str) -> Response {
    warn!(error = msg, "rejected request");
    error_response(StatusCode::BAD_REQUEST, msg)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
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
    let payload = serde_json::from_str::<AnalysisPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: AnalysisPayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli();

    if let Some(v) = payload.price {
        cli.price = v;
    }
    if let Some(v) = payload.down_payment {
        cli.down_payment = v;
    }
    if let Some(v) = payload.interest_rate {
        cli.interest_rate = v;
    }
    if let Some(v) = payload.loan_term_years {
        cli.loan_term_years = v;
    }
    if let Some(v) = payload.monthly_rent {
        cli.monthly_rent = v;
    }
    if let Some(v) = payload.rent_growth {
        cli.rent_growth = v;
    }
    if let Some(v) = payload.house_growth {
        cli.house_growth = v;
    }
    if let Some(v) = payload.discount_rate {
        cli.discount_rate = v;
    }
    if let Some(v) = payload.investment_return {
        cli.investment_return = Some(v);
    }
    if let Some(v) = payload.inflation {
        cli.inflation = Some(v);
    }
    if let Some(v) = payload.inflation_adjusted {
        cli.inflation_adjusted = v;
    }
    if let Some(v) = payload.years_before_sale {
        cli.years_before_sale = v;
    }
    if let Some(v) = payload.hold_to_maturity {
        cli.hold_to_maturity = v;
    }
    if let Some(v) = payload.lifetime {
        cli.lifetime = v;
    }
    if let Some(v) = payload.buy_commission {
        cli.buy_commission = v;
    }
    if let Some(v) = payload.stamp_duty {
        cli.stamp_duty = v;
    }
    if let Some(v) = payload.fixed_fees {
        cli.fixed_fees = v;
    }
    if let Some(v) = payload.monthly_costs {
        cli.monthly_costs = v;
    }
    if let Some(v) = payload.sell_commission {
        cli.sell_commission = v;
    }
    if let Some(v) = payload.mode {
        cli.mode = v.into();
    }
    if let Some(v) = payload.rent_initial_outlay {
        cli.rent_initial_outlay = v.into();
    }
    if let Some(v) = payload.seed_investment {
        cli.seed_investment = v;
    }
    if let Some(v) = payload.invest_difference {
        cli.invest_difference = v;
    }
    if let Some(v) = payload.marginal_tax_rate {
        cli.marginal_tax_rate = v;
    }
    if let Some(v) = payload.interest_deduction_cap {
        cli.interest_deduction_cap = v;
    }
    if let Some(v) = payload.principal_deduction_cap {
        cli.principal_deduction_cap = v;
    }
    if let Some(v) = payload.capital_gains_rate {
        cli.capital_gains_rate = v;
    }
    if let Some(v) = payload.hra_received {
        cli.hra_received = Some(v);
    }
    if let Some(v) = payload.basic_salary {
        cli.basic_salary = Some(v);
    }
    if let Some(v) = payload.metro {
        cli.metro = v;
    }
    if let Some(v) = payload.scenario_delta {
        cli.scenario_delta = v;
    }
    if let Some(v) = payload.sweep_min {
        cli.sweep_min = v;
    }
    if let Some(v) = payload.sweep_max {
        cli.sweep_max = v;
    }
    if let Some(v) = payload.sweep_points {
        cli.sweep_points = v;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.house_growth_sd {
        cli.house_growth_sd = v;
    }
    if let Some(v) = payload.rent_growth_sd {
        cli.rent_growth_sd = v;
    }
    if let Some(v) = payload.growth_correlation {
        cli.growth_correlation = v;
    }
    if let Some(v) = payload.histogram_bins {
        cli.histogram_bins = v;
    }
    if let Some(v) = payload.fan_chart_years {
        cli.fan_chart_years = Some(v);
    }

    build_request(&cli)
}

fn default_cli() -> Cli {
    Cli {
        price: 1_500_000.0,
        down_payment: 20.0,
        interest_rate: 3.0,
        loan_term_years: 30,
        monthly_rent: 4_000.0,
        rent_growth: 2.0,
        house_growth: 3.0,
        discount_rate: 5.0,
        investment_return: None,
        inflation: None,
        inflation_adjusted: false,
        years_before_sale: 10,
        hold_to_maturity: false,
        lifetime: false,
        buy_commission: 1.0,
        stamp_duty: 3.0,
        fixed_fees: 8_000.0,
        monthly_costs: 450.0,
        sell_commission: 1.0,
        mode: CliMode::Simple,
        rent_initial_outlay: CliRentOutlay::MirrorBuy,
        seed_investment: true,
        invest_difference: false,
        marginal_tax_rate: 30.0,
        interest_deduction_cap: 200_000.0,
        principal_deduction_cap: 150_000.0,
        capital_gains_rate: 20.0,
        hra_received: None,
        basic_salary: None,
        metro: false,
        scenario_delta: 1.0,
        sweep_min: -5.0,
        sweep_max: 8.0,
        sweep_points: 40,
        monte_carlo: false,
        simulations: 500,
        seed: 42,
        house_growth_sd: 1.0,
        rent_growth_sd: 1.0,
        growth_correlation: 0.4,
        histogram_bins: 20,
        fan_chart_years: None,
    }
}

fn build_compare_response(request: &ApiRequest) -> Result<CompareResponse, NpvError> {
    let inputs = &request.inputs;
    let options = &request.options;

    let flows = build_cash_flows(inputs, &Overrides::default())?;
    let principal = inputs.loan.principal();

    Ok(CompareResponse {
        installment: flows.installment,
        loan_principal: principal,
        year_one: year_one_breakdown(
            principal,
            inputs.loan.monthly_rate(),
            inputs.loan.installments(),
        )?,
        base: compute_npv(inputs, &Overrides::default())?,
        resale: flows.resale,
        scenarios: scenario_table(inputs, options.scenario_delta)?,
        sensitivity: sensitivity_sweep(inputs, options.sweep)?,
        break_even_horizon: break_even_horizon(inputs)?,
        break_even_growth: solve_break_even_growth(inputs, GrowthSolveConfig::default())?.into(),
    })
}

fn build_monte_carlo_response(request: &ApiRequest) -> Result<MonteCarloResponse, NpvError> {
    let inputs = &request.inputs;
    let options = &request.options;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let summary = run_monte_carlo(inputs, &options.monte_carlo, &mut rng)?;
    let fan_chart = run_fan_chart(
        inputs,
        &options.monte_carlo,
        options.fan_chart_years,
        &mut rng,
    )?;

    Ok(MonteCarloResponse {
        seed: options.seed,
        summary,
        fan_chart,
    })
}
