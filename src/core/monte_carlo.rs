use rand::Rng;
use rand_distr::StandardNormal;
use serde::Serialize;
use tracing::debug;

use super::engine::compute_npv;
use super::error::{EngineResult, NpvError};
use super::types::{
    Inputs, MAX_HISTOGRAM_BINS, MAX_HORIZON_YEARS, MAX_SIMULATIONS, Overrides,
};

#[derive(Debug, Clone, Copy)]
pub struct MonteCarloConfig {
    pub simulations: u32,
    pub house_growth_sd: f64,
    pub rent_growth_sd: f64,
    /// Correlation between the house and rent growth draws.
    pub correlation: f64,
    pub histogram_bins: u32,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            simulations: 500,
            house_growth_sd: 0.01,
            rent_growth_sd: 0.01,
            correlation: 0.4,
            histogram_bins: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthSample {
    pub house_growth: f64,
    pub rent_growth: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloSummary {
    pub simulations: u32,
    pub probability_buy_wins: f64,
    pub mean_advantage: f64,
    pub median_advantage: f64,
    pub p10_advantage: f64,
    pub p90_advantage: f64,
    pub min_advantage: f64,
    pub max_advantage: f64,
    pub histogram: Vec<HistogramBin>,
    pub outcomes: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanChartYear {
    pub years: u32,
    pub p10_advantage: f64,
    pub median_advantage: f64,
    pub p90_advantage: f64,
    pub mean_advantage: f64,
    pub probability_buy_wins: f64,
}

/// Draws correlated (house, rent) growth around the configured means.
pub fn sample_growth<R: Rng + ?Sized>(
    inputs: &Inputs,
    config: &MonteCarloConfig,
    rng: &mut R,
) -> GrowthSample {
    let z1: f64 = rng.sample(StandardNormal);
    let z2: f64 = rng.sample(StandardNormal);

    let corr = config.correlation;
    let orth = (1.0 - corr * corr).sqrt();

    GrowthSample {
        house_growth: inputs.market.house_growth + config.house_growth_sd * z1,
        rent_growth: inputs.market.rent_growth + config.rent_growth_sd * (corr * z1 + orth * z2),
    }
}

pub fn run_monte_carlo<R: Rng + ?Sized>(
    inputs: &Inputs,
    config: &MonteCarloConfig,
    rng: &mut R,
) -> EngineResult<MonteCarloSummary> {
    validate_config(config)?;

    let mut outcomes = Vec::with_capacity(config.simulations as usize);
    for _ in 0..config.simulations {
        let sample = sample_growth(inputs, config, rng);
        let result = compute_npv(
            inputs,
            &Overrides::growth(sample.house_growth, sample.rent_growth),
        )?;
        outcomes.push(result.advantage);
    }

    let wins = outcomes.iter().filter(|&&v| v > 0.0).count();
    let probability_buy_wins = wins as f64 / outcomes.len() as f64;
    let mean_advantage = mean(&outcomes);
    let histogram = histogram(&outcomes, config.histogram_bins);

    let mut sorted = outcomes.clone();
    let summary = MonteCarloSummary {
        simulations: config.simulations,
        probability_buy_wins,
        mean_advantage,
        median_advantage: percentile(&mut sorted, 50.0),
        p10_advantage: percentile(&mut sorted, 10.0),
        p90_advantage: percentile(&mut sorted, 90.0),
        min_advantage: sorted[0],
        max_advantage: sorted[sorted.len() - 1],
        histogram,
        outcomes,
    };

    debug!(
        simulations = summary.simulations,
        probability_buy_wins = summary.probability_buy_wins,
        "monte carlo complete"
    );
    Ok(summary)
}

/// Envelope of simulated buy-minus-rent paths, one growth draw per path held
/// across every holding period from one year to `max_years`.
pub fn run_fan_chart<R: Rng + ?Sized>(
    inputs: &Inputs,
    config: &MonteCarloConfig,
    max_years: u32,
    rng: &mut R,
) -> EngineResult<Vec<FanChartYear>> {
    validate_config(config)?;
    validate_max_years(max_years)?;

    let mut by_year = (0..max_years)
        .map(|_| Vec::with_capacity(config.simulations as usize))
        .collect::<Vec<Vec<f64>>>();

    for _ in 0..config.simulations {
        let sample = sample_growth(inputs, config, rng);
        for (idx, years) in (1..=max_years).enumerate() {
            let overrides = Overrides {
                house_growth: Some(sample.house_growth),
                rent_growth: Some(sample.rent_growth),
                years: Some(years),
                hold_to_maturity: false,
            };
            by_year[idx].push(compute_npv(inputs, &overrides)?.advantage);
        }
    }

    let fan = by_year
        .into_iter()
        .zip(1..=max_years)
        .map(|(mut values, years)| {
            let wins = values.iter().filter(|&&v| v > 0.0).count();
            FanChartYear {
                years,
                mean_advantage: mean(&values),
                probability_buy_wins: wins as f64 / values.len() as f64,
                p10_advantage: percentile(&mut values, 10.0),
                median_advantage: percentile(&mut values, 50.0),
                p90_advantage: percentile(&mut values, 90.0),
            }
        })
        .collect::<Vec<_>>();

    debug!(years = fan.len(), "fan chart complete");
    Ok(fan)
}

fn validate_config(config: &MonteCarloConfig) -> EngineResult<()> {
    if config.simulations == 0 || config.simulations > MAX_SIMULATIONS {
        return Err(NpvError::invalid(
            "simulations",
            format!("must be between 1 and {MAX_SIMULATIONS}, got {}", config.simulations),
        ));
    }
    for (field, sd) in [
        ("house_growth_sd", config.house_growth_sd),
        ("rent_growth_sd", config.rent_growth_sd),
    ] {
        if !sd.is_finite() || sd < 0.0 {
            return Err(NpvError::invalid(field, format!("must be >= 0, got {sd}")));
        }
    }
    if !(-1.0..=1.0).contains(&config.correlation) {
        return Err(NpvError::invalid(
            "correlation",
            format!("must be between -1 and 1, got {}", config.correlation),
        ));
    }
    if config.histogram_bins == 0 || config.histogram_bins > MAX_HISTOGRAM_BINS {
        return Err(NpvError::invalid(
            "histogram_bins",
            format!(
                "must be between 1 and {MAX_HISTOGRAM_BINS}, got {}",
                config.histogram_bins
            ),
        ));
    }
    Ok(())
}

fn validate_max_years(max_years: u32) -> EngineResult<()> {
    if max_years == 0 || max_years > MAX_HORIZON_YEARS {
        return Err(NpvError::invalid(
            "max_years",
            format!("must be between 1 and {MAX_HORIZON_YEARS}, got {max_years}"),
        ));
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn histogram(values: &[f64], bins: u32) -> Vec<HistogramBin> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().fold(min, f64::max);

    if max == min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len() as u32,
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0_u32; bins as usize];
    for &value in values {
        let idx = (((value - min) / width) as usize).min(bins as usize - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            lower: min + width * idx as f64,
            upper: min + width * (idx + 1) as f64,
            count,
        })
        .collect()
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{india_inputs, reference_inputs};
    use proptest::prelude::{any, prop_assert, proptest};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SEED: u64 = 42;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn zero_variance() -> MonteCarloConfig {
        MonteCarloConfig {
            simulations: 25,
            house_growth_sd: 0.0,
            rent_growth_sd: 0.0,
            ..MonteCarloConfig::default()
        }
    }

    #[test]
    fn zero_variance_reproduces_deterministic_result_for_every_draw() {
        let inputs = reference_inputs();
        let deterministic = compute_npv(&inputs, &Overrides::default()).expect("valid");

        let mut rng = StdRng::seed_from_u64(SEED);
        let summary = run_monte_carlo(&inputs, &zero_variance(), &mut rng).expect("valid");

        assert_eq!(summary.outcomes.len(), 25);
        for outcome in &summary.outcomes {
            assert_eq!(outcome.to_bits(), deterministic.advantage.to_bits());
        }
        assert_eq!(summary.probability_buy_wins, 1.0);
        assert_eq!(summary.histogram.len(), 1);
        assert_eq!(summary.histogram[0].count, 25);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let inputs = reference_inputs();
        let config = MonteCarloConfig {
            simulations: 64,
            ..MonteCarloConfig::default()
        };

        let a = run_monte_carlo(&inputs, &config, &mut StdRng::seed_from_u64(SEED)).expect("ok");
        let b = run_monte_carlo(&inputs, &config, &mut StdRng::seed_from_u64(SEED)).expect("ok");
        assert_eq!(a.outcomes, b.outcomes);
        assert_eq!(a.probability_buy_wins, b.probability_buy_wins);

        let c = run_monte_carlo(&inputs, &config, &mut StdRng::seed_from_u64(SEED + 1))
            .expect("ok");
        assert_ne!(a.outcomes, c.outcomes);
    }

    #[test]
    fn summary_statistics_are_consistent() {
        let inputs = india_inputs();
        let config = MonteCarloConfig {
            simulations: 200,
            house_growth_sd: 0.02,
            rent_growth_sd: 0.015,
            ..MonteCarloConfig::default()
        };
        let summary =
            run_monte_carlo(&inputs, &config, &mut StdRng::seed_from_u64(SEED)).expect("ok");

        assert!((0.0..=1.0).contains(&summary.probability_buy_wins));
        assert!(summary.min_advantage <= summary.p10_advantage);
        assert!(summary.p10_advantage <= summary.median_advantage);
        assert!(summary.median_advantage <= summary.p90_advantage);
        assert!(summary.p90_advantage <= summary.max_advantage);
        assert_eq!(
            summary.histogram.iter().map(|bin| bin.count).sum::<u32>(),
            200
        );
        let wins = summary.outcomes.iter().filter(|&&v| v > 0.0).count();
        assert_approx(summary.probability_buy_wins, wins as f64 / 200.0);
    }

    #[test]
    fn correlated_draws_follow_requested_correlation() {
        let inputs = reference_inputs();
        let config = MonteCarloConfig {
            correlation: 0.4,
            house_growth_sd: 0.01,
            rent_growth_sd: 0.01,
            ..MonteCarloConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(SEED);
        let samples = (0..20_000)
            .map(|_| sample_growth(&inputs, &config, &mut rng))
            .collect::<Vec<_>>();

        let n = samples.len() as f64;
        let mh = samples.iter().map(|s| s.house_growth).sum::<f64>() / n;
        let mr = samples.iter().map(|s| s.rent_growth).sum::<f64>() / n;
        let cov = samples
            .iter()
            .map(|s| (s.house_growth - mh) * (s.rent_growth - mr))
            .sum::<f64>()
            / n;
        let sh = (samples.iter().map(|s| (s.house_growth - mh).powi(2)).sum::<f64>() / n).sqrt();
        let sr = (samples.iter().map(|s| (s.rent_growth - mr).powi(2)).sum::<f64>() / n).sqrt();

        assert!((mh - 0.03).abs() < 5e-4);
        assert!((mr - 0.02).abs() < 5e-4);
        assert!((sh - 0.01).abs() < 5e-4);
        assert!((cov / (sh * sr) - 0.4).abs() < 0.05);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let inputs = reference_inputs();
        let mut rng = StdRng::seed_from_u64(SEED);
        let bad = [
            MonteCarloConfig {
                simulations: 0,
                ..MonteCarloConfig::default()
            },
            MonteCarloConfig {
                correlation: 1.5,
                ..MonteCarloConfig::default()
            },
            MonteCarloConfig {
                house_growth_sd: -0.01,
                ..MonteCarloConfig::default()
            },
            MonteCarloConfig {
                histogram_bins: 0,
                ..MonteCarloConfig::default()
            },
            MonteCarloConfig {
                histogram_bins: MAX_HISTOGRAM_BINS + 1,
                ..MonteCarloConfig::default()
            },
        ];
        for config in bad {
            assert!(run_monte_carlo(&inputs, &config, &mut rng).is_err());
        }
    }

    #[test]
    fn fan_chart_collapses_to_deterministic_series_without_variance() {
        let inputs = reference_inputs();
        let mut rng = StdRng::seed_from_u64(SEED);
        let fan = run_fan_chart(&inputs, &zero_variance(), 12, &mut rng).expect("valid");

        assert_eq!(fan.len(), 12);
        for year in &fan {
            let expected = compute_npv(&inputs, &Overrides::years(year.years))
                .expect("valid")
                .advantage;
            assert_eq!(year.p10_advantage.to_bits(), expected.to_bits());
            assert_eq!(year.p90_advantage.to_bits(), expected.to_bits());
            assert_approx(year.mean_advantage, expected);
        }
        assert_eq!(fan[0].probability_buy_wins, 0.0);
        assert_eq!(fan[11].probability_buy_wins, 1.0);
    }

    #[test]
    fn fan_chart_envelope_is_ordered() {
        let inputs = reference_inputs();
        let config = MonteCarloConfig {
            simulations: 60,
            ..MonteCarloConfig::default()
        };
        let fan = run_fan_chart(&inputs, &config, 15, &mut StdRng::seed_from_u64(SEED))
            .expect("valid");
        for year in &fan {
            assert!(year.p10_advantage <= year.median_advantage);
            assert!(year.median_advantage <= year.p90_advantage);
        }
        assert!(run_fan_chart(&inputs, &config, 0, &mut StdRng::seed_from_u64(SEED)).is_err());
    }

    #[test]
    fn fan_chart_rejects_horizon_beyond_cap_before_simulating() {
        let inputs = reference_inputs();
        let config = MonteCarloConfig {
            simulations: 1,
            ..MonteCarloConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(SEED);

        for max_years in [MAX_HORIZON_YEARS + 1, 4_000_000_000] {
            assert!(matches!(
                run_fan_chart(&inputs, &config, max_years, &mut rng),
                Err(NpvError::InvalidInput {
                    field: "max_years",
                    ..
                })
            ));
        }
    }

    #[test]
    fn simulation_count_is_capped() {
        let inputs = reference_inputs();
        let config = MonteCarloConfig {
            simulations: MAX_SIMULATIONS + 1,
            ..MonteCarloConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(SEED);

        assert!(matches!(
            run_monte_carlo(&inputs, &config, &mut rng),
            Err(NpvError::InvalidInput {
                field: "simulations",
                ..
            })
        ));
        assert!(run_fan_chart(&inputs, &config, 5, &mut rng).is_err());
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_approx(percentile(&mut values, 50.0), 2.5);
        assert_approx(percentile(&mut values, 0.0), 1.0);
        assert_approx(percentile(&mut values, 100.0), 4.0);
        assert_eq!(percentile(&mut [], 50.0), 0.0);
    }

    #[test]
    fn histogram_puts_maximum_in_last_bin() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 1, 1, 2]);
        assert_approx(bins[3].upper, 4.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(24))]

        #[test]
        fn prop_seeded_runs_are_order_independent_in_aggregate(seed in any::<u64>()) {
            let inputs = reference_inputs();
            let config = MonteCarloConfig {
                simulations: 30,
                ..MonteCarloConfig::default()
            };
            let summary =
                run_monte_carlo(&inputs, &config, &mut StdRng::seed_from_u64(seed)).expect("ok");

            let mut reversed = summary.outcomes.clone();
            reversed.reverse();
            let wins = reversed.iter().filter(|&&v| v > 0.0).count() as f64 / 30.0;
            prop_assert!((wins - summary.probability_buy_wins).abs() < 1e-12);
            prop_assert!((mean(&reversed) - summary.mean_advantage).abs() < 1e-6);
            prop_assert!((percentile(&mut reversed, 50.0) - summary.median_advantage).abs() < 1e-9);
        }
    }
}
