//! Resolved runtime parameters for the simulation
//!
//! `Parameters` is what the core actually runs with. It is built from the
//! YAML-facing [`SimulationConfig`] once, validated, and never re-read:
//! - coarse step size, end time and the derived step count,
//! - safety ceilings (total steps, subdivision depth),
//! - optional force magnitude cap,
//! - per-body adaptability thresholds (`AdaptabilityParams`)

use log::warn;

use crate::configuration::config::{AdaptabilityConfig, SimulationConfig};
use crate::error::{Result, SimError};

/// Divisor applied to `time_step` when neither `min_time_step` nor
/// `min_relative_time_step_reduction` is configured
pub const DEFAULT_TIME_STEP_REDUCTION: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct Parameters {
    pub simulation_time: f64, // total simulated time
    pub time_step: f64, // coarse step size
    pub number_of_steps: usize, // coarse steps implied by the two above
    pub max_time_steps: usize, // safety ceiling on number_of_steps
    pub max_recursion_depth: usize, // cap on nested subdivisions
    pub max_allowed_force: Option<f64>, // None = unlimited
    pub adaptability: AdaptabilityParams,
}

/// Thresholds for one [`AdaptabilityController`](super::adaptability::AdaptabilityController).
/// A disabled check is `None`
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptabilityParams {
    pub is_adaptive: bool,
    pub max_absolute_value: Option<f64>,
    pub max_quantile: Option<f64>,
    pub max_deviation: Option<f64>,
    pub min_time_step: f64,
    pub quantile_ignored_extremes: f64, // fraction per tail, in [0, 0.5)
    pub history_window: Option<usize>,
}

impl Default for AdaptabilityParams {
    /// Adaptivity switched off: every step is accepted
    fn default() -> Self {
        Self {
            is_adaptive: false,
            max_absolute_value: None,
            max_quantile: None,
            max_deviation: None,
            min_time_step: 0.0,
            quantile_ignored_extremes: 0.1,
            history_window: None,
        }
    }
}

impl Parameters {
    pub fn from_config(cfg: &SimulationConfig) -> Result<Self> {
        if !(cfg.time_step.is_finite() && cfg.time_step > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "time_step must be finite and positive, got {}",
                cfg.time_step
            )));
        }
        if !(cfg.simulation_time.is_finite() && cfg.simulation_time >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "simulation_time must be finite and non-negative, got {}",
                cfg.simulation_time
            )));
        }
        if let Some(max_force) = cfg.max_allowed_force {
            if max_force.is_nan() || max_force <= 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "max_allowed_force must be positive, got {max_force}"
                )));
            }
        }

        let number_of_steps = steps_in(cfg.simulation_time, cfg.time_step);
        if number_of_steps > cfg.max_time_steps {
            return Err(SimError::TooManySteps {
                steps: number_of_steps,
                ceiling: cfg.max_time_steps,
            });
        }

        let min_time_step = resolve_min_time_step(cfg)?;
        let adaptability = AdaptabilityParams::from_config(&cfg.adaptability, min_time_step)?;

        Ok(Self {
            simulation_time: cfg.simulation_time,
            time_step: cfg.time_step,
            number_of_steps,
            max_time_steps: cfg.max_time_steps,
            max_recursion_depth: cfg.max_recursion_depth,
            // infinity is the YAML spelling of "no limit"
            max_allowed_force: cfg.max_allowed_force.filter(|f| f.is_finite()),
            adaptability,
        })
    }
}

impl AdaptabilityParams {
    pub fn from_config(cfg: &AdaptabilityConfig, min_time_step: f64) -> Result<Self> {
        if cfg.max_relative_log_diff > 0.0 {
            warn!(
                "max_relative_log_diff = {} is deprecated and ignored",
                cfg.max_relative_log_diff
            );
        }
        if !(0.0..100.0).contains(&cfg.quantile_ignored_extremes) {
            return Err(SimError::InvalidConfig(format!(
                "quantile_ignored_extremes is a percentage in [0, 100), got {}",
                cfg.quantile_ignored_extremes
            )));
        }
        if cfg.history_window == Some(0) {
            return Err(SimError::InvalidConfig("history_window must be at least 1".into()));
        }

        // Each tail may ignore at most just under half of the samples
        let ignored = (cfg.quantile_ignored_extremes / 100.0).min(0.49);

        Ok(Self {
            is_adaptive: cfg.is_adaptive,
            max_absolute_value: Some(cfg.max_absolute_value).filter(|v| v.is_finite()),
            max_quantile: Some(cfg.max_quantile).filter(|q| *q > 0.0),
            max_deviation: Some(cfg.max_deviation).filter(|d| *d > 0.0),
            min_time_step,
            quantile_ignored_extremes: ignored,
            history_window: cfg.history_window,
        })
    }
}

fn resolve_min_time_step(cfg: &SimulationConfig) -> Result<f64> {
    let min_time_step = match (cfg.adaptability.min_time_step, cfg.min_relative_time_step_reduction) {
        (Some(min), _) => min,
        (None, Some(reduction)) => {
            if !(reduction.is_finite() && reduction >= 1.0) {
                return Err(SimError::InvalidConfig(format!(
                    "min_relative_time_step_reduction must be >= 1, got {reduction}"
                )));
            }
            cfg.time_step / reduction
        }
        (None, None) => cfg.time_step / DEFAULT_TIME_STEP_REDUCTION,
    };

    if !(min_time_step.is_finite() && min_time_step > 0.0) {
        return Err(SimError::InvalidConfig(format!(
            "min_time_step must be finite and positive, got {min_time_step}"
        )));
    }
    Ok(min_time_step)
}

/// Number of whole coarse steps of `time_step` that fit in `simulation_time`.
/// Ratios within a few ulps of an integer are rounded to it (40 / 0.01 is 4000, not 3999)
pub fn steps_in(simulation_time: f64, time_step: f64) -> usize {
    let ratio = simulation_time / time_step;
    let nearest = ratio.round();
    if (ratio - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest as usize
    } else {
        ratio.floor() as usize
    }
}
