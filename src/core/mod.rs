mod amortization;
mod engine;
mod error;
mod monte_carlo;
mod scenarios;
mod solver;
mod types;

pub use amortization::{amortization_schedule, monthly_installment, year_one_breakdown};
pub use engine::{build_cash_flows, compute_npv, present_value};
pub use error::{EngineResult, NpvError};
pub use monte_carlo::{
    FanChartYear, GrowthSample, HistogramBin, MonteCarloConfig, MonteCarloSummary, run_fan_chart,
    run_monte_carlo, sample_growth,
};
pub use scenarios::{
    DEFAULT_SCENARIO_DELTA, SweepConfig, break_even_horizon, npv_by_year, scenario_table,
    sensitivity_sweep,
};
pub use solver::{
    GrowthSolveConfig, GrowthSolveIteration, GrowthSolveResult, solve_break_even_growth,
};
pub use types::{
    AmortizationRow, BreakEvenHorizon, CashFlows, ConfigurationMode, CostSchedule, EngineConfig,
    HorizonSpec, HraRule, Inputs, LoanTerms, MAX_HISTOGRAM_BINS, MAX_HORIZON_YEARS,
    MAX_SIMULATIONS, MAX_SWEEP_POINTS, MarketAssumptions, NpvResult, Overrides, RentInitialOutlay,
    RentPathOptions, ResaleOutcome, ScenarioRow, SensitivityCurve, SweepPoint, TaxRegime,
    YearOneBreakdown, YearPoint,
};
