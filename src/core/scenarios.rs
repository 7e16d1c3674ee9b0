use tracing::debug;

use super::engine::compute_npv;
use super::error::{EngineResult, NpvError, ensure_finite};
use super::types::{
    BreakEvenHorizon, Inputs, MAX_HORIZON_YEARS, MAX_SWEEP_POINTS, Overrides, ScenarioRow,
    SensitivityCurve, SweepPoint, YearPoint,
};

pub const DEFAULT_SCENARIO_DELTA: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    pub min: f64,
    pub max: f64,
    pub points: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min: -0.05,
            max: 0.08,
            points: 40,
        }
    }
}

/// Base, boom and crash rows: house growth at its base value and shifted by `delta` either way.
pub fn scenario_table(inputs: &Inputs, delta: f64) -> EngineResult<Vec<ScenarioRow>> {
    ensure_finite("scenario_delta", delta)?;
    let house_growth = inputs.market.house_growth;
    let rent_growth = inputs.market.rent_growth;

    [
        ("Base", house_growth),
        ("Boom", house_growth + delta),
        ("Crash", house_growth - delta),
    ]
    .into_iter()
    .map(|(name, growth)| {
        let result = compute_npv(inputs, &Overrides::growth(growth, rent_growth))?;
        Ok(ScenarioRow {
            name: name.to_string(),
            house_growth: growth,
            rent_growth,
            buy_pv: result.buy_pv,
            rent_pv: result.rent_pv,
            advantage: result.advantage,
        })
    })
    .collect()
}

pub fn sensitivity_sweep(inputs: &Inputs, config: SweepConfig) -> EngineResult<SensitivityCurve> {
    validate_sweep(config)?;

    let span = config.max - config.min;
    let last = (config.points - 1) as f64;
    let mut points = Vec::with_capacity(config.points as usize);
    for idx in 0..config.points {
        let growth = config.min + span * idx as f64 / last;
        let result = compute_npv(
            inputs,
            &Overrides::growth(growth, inputs.market.rent_growth),
        )?;
        points.push(SweepPoint {
            house_growth: growth,
            buy_pv: result.buy_pv,
            rent_pv: result.rent_pv,
            advantage: result.advantage,
        });
    }

    let crossings = zero_crossings(&points);
    debug!(
        points = points.len(),
        crossings = crossings.len(),
        "sensitivity sweep complete"
    );
    Ok(SensitivityCurve { points, crossings })
}

/// Buy-minus-rent for each holding period from one year to `max_years`, selling at the end.
pub fn npv_by_year(inputs: &Inputs, max_years: u32) -> EngineResult<Vec<YearPoint>> {
    if max_years == 0 || max_years > MAX_HORIZON_YEARS {
        return Err(NpvError::invalid(
            "max_years",
            format!("must be between 1 and {MAX_HORIZON_YEARS}, got {max_years}"),
        ));
    }
    (1..=max_years)
        .map(|years| {
            let result = compute_npv(inputs, &Overrides::years(years))?;
            Ok(YearPoint {
                years,
                buy_pv: result.buy_pv,
                rent_pv: result.rent_pv,
                advantage: result.advantage,
            })
        })
        .collect()
}

pub fn break_even_horizon(inputs: &Inputs) -> EngineResult<BreakEvenHorizon> {
    let searched_years = inputs.loan.term_years;
    let series = npv_by_year(inputs, searched_years)?;
    let break_even_years = series
        .iter()
        .find(|point| point.advantage > 0.0)
        .map(|point| point.years);

    match break_even_years {
        Some(years) => debug!(years, "buying overtakes renting"),
        None => debug!(searched_years, "renting wins throughout the loan term"),
    }

    Ok(BreakEvenHorizon {
        break_even_years,
        searched_years,
        series,
    })
}

fn zero_crossings(points: &[SweepPoint]) -> Vec<f64> {
    let mut crossings = Vec::new();
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.advantage == 0.0 {
            crossings.push(a.house_growth);
        } else if b.advantage != 0.0 && a.advantage.signum() != b.advantage.signum() {
            let w = a.advantage / (a.advantage - b.advantage);
            crossings.push(a.house_growth + w * (b.house_growth - a.house_growth));
        }
    }
    if let Some(last) = points.last() {
        if last.advantage == 0.0 {
            crossings.push(last.house_growth);
        }
    }
    crossings
}

fn validate_sweep(config: SweepConfig) -> EngineResult<()> {
    ensure_finite("sweep_min", config.min)?;
    ensure_finite("sweep_max", config.max)?;
    if config.max <= config.min {
        return Err(NpvError::invalid("sweep_max", "must be greater than sweep_min"));
    }
    if config.points < 2 || config.points > MAX_SWEEP_POINTS {
        return Err(NpvError::invalid(
            "sweep_points",
            format!("must be between 2 and {MAX_SWEEP_POINTS}, got {}", config.points),
        ));
    }
    Ok(())
}
