use tracing::debug;

use super::engine::compute_npv;
use super::error::{EngineResult, NpvError};
use super::types::{Inputs, Overrides};

#[derive(Debug, Clone, Copy)]
pub struct GrowthSolveConfig {
    /// Holding period to evaluate; `None` uses the configured horizon.
    pub years: Option<u32>,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for GrowthSolveConfig {
    fn default() -> Self {
        Self {
            years: None,
            search_min: -0.10,
            search_max: 0.20,
            tolerance: 1e-6,
            max_iterations: 64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GrowthSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_growth: f64,
    pub advantage: f64,
}

#[derive(Debug, Clone)]
pub struct GrowthSolveResult {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub break_even_growth: Option<f64>,
    pub iterations: Vec<GrowthSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Bisects for the house-price growth rate at which buying and renting break even.
///
/// Relies on buy-minus-rent being non-decreasing in house growth; the bounds are
/// checked before the search starts, so a range that never crosses zero is
/// reported as infeasible rather than searched.
pub fn solve_break_even_growth(
    inputs: &Inputs,
    config: GrowthSolveConfig,
) -> EngineResult<GrowthSolveResult> {
    validate_config(config)?;

    let evaluate = |growth: f64| -> EngineResult<f64> {
        let overrides = Overrides {
            house_growth: Some(growth),
            years: config.years,
            ..Overrides::default()
        };
        Ok(compute_npv(inputs, &overrides)?.advantage)
    };

    let low_advantage = evaluate(config.search_min)?;
    let high_advantage = evaluate(config.search_max)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut break_even_growth = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_advantage >= 0.0 {
        break_even_growth = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Buying already wins at the lower growth bound.".to_string();
    } else if high_advantage < 0.0 {
        feasible = false;
        message = "Renting wins across the whole growth search range.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let advantage = evaluate(mid)?;
            iterations.push(GrowthSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_growth: mid,
                advantage,
            });

            if advantage >= 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        break_even_growth = Some(hi);
        feasible = true;
        message = if converged {
            "Solved break-even house price growth.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    debug!(
        iterations = iterations.len(),
        converged,
        feasible,
        "break-even growth search finished"
    );

    Ok(GrowthSolveResult {
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        break_even_growth,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn validate_config(config: GrowthSolveConfig) -> EngineResult<()> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(NpvError::invalid("search_bounds", "must be finite"));
    }
    if config.search_max <= config.search_min {
        return Err(NpvError::invalid(
            "search_max",
            "must be greater than search_min",
        ));
    }
    if config.search_min <= -1.0 {
        return Err(NpvError::invalid("search_min", "must be > -100%"));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(NpvError::invalid("tolerance", "must be > 0"));
    }
    if config.max_iterations == 0 {
        return Err(NpvError::invalid("max_iterations", "must be > 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::reference_inputs;
    use crate::core::types::HorizonSpec;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn solver_finds_growth_where_advantage_vanishes() {
        let inputs = reference_inputs();
        let config = GrowthSolveConfig::default();

        let result = solve_break_even_growth(&inputs, config).expect("must solve");
        assert!(result.feasible);
        assert!(result.converged);
        let growth = result.break_even_growth.expect("growth expected");
        assert_close(growth, 0.013_1, 5e-4);

        let at_root = compute_npv(&inputs, &Overrides::growth(growth, 0.02)).expect("valid");
        assert!(at_root.advantage >= 0.0);
        // Bisection stops within `tolerance` of the root, a few currency units away.
        assert!(at_root.advantage < 50.0);

        for pair in result.iterations.windows(2) {
            let width = |it: &GrowthSolveIteration| it.upper_bound - it.lower_bound;
            assert!(width(&pair[1]) < width(&pair[0]));
        }
    }

    #[test]
    fn solver_reports_infeasible_when_renting_always_wins() {
        let mut inputs = reference_inputs();
        inputs.market.monthly_rent = 500.0;
        inputs.market.rent_growth = 0.0;
        let config = GrowthSolveConfig {
            years: Some(2),
            search_min: -0.05,
            search_max: 0.0,
            ..GrowthSolveConfig::default()
        };

        let result = solve_break_even_growth(&inputs, config).expect("must return result");
        assert!(!result.feasible);
        assert!(result.break_even_growth.is_none());
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn solver_short_circuits_when_lower_bound_already_wins() {
        let inputs = reference_inputs();
        let config = GrowthSolveConfig {
            years: Some(20),
            search_min: 0.05,
            search_max: 0.10,
            ..GrowthSolveConfig::default()
        };

        let result = solve_break_even_growth(&inputs, config).expect("must solve");
        assert!(result.feasible);
        assert_eq!(result.break_even_growth, Some(0.05));
    }

    #[test]
    fn solver_without_sale_is_insensitive_to_growth() {
        let mut inputs = reference_inputs();
        inputs.horizon = HorizonSpec::Hold { years: Some(5) };

        let result =
            solve_break_even_growth(&inputs, GrowthSolveConfig::default()).expect("must return");
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn solver_rejects_bad_config() {
        let inputs = reference_inputs();
        let bad = [
            GrowthSolveConfig {
                search_min: 0.1,
                search_max: 0.0,
                ..GrowthSolveConfig::default()
            },
            GrowthSolveConfig {
                tolerance: 0.0,
                ..GrowthSolveConfig::default()
            },
            GrowthSolveConfig {
                max_iterations: 0,
                ..GrowthSolveConfig::default()
            },
            GrowthSolveConfig {
                search_min: -1.0,
                ..GrowthSolveConfig::default()
            },
        ];
        for config in bad {
            assert!(solve_break_even_growth(&inputs, config).is_err());
        }
    }
}
