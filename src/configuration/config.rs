//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`SimulationConfig`]   – time stepping, safety ceilings, force cap
//! - [`AdaptabilityConfig`] – step-quality thresholds (nested in the above)
//! - [`PlottingConfig`]     – playback and dot sizing for a viewer
//! - [`BodyConfig`]         – initial state for each body
//! - [`ForcesConfig`]       – the single-body and pairwise forces in play
//! - [`ScenarioConfig`]     – top-level wrapper loaded from YAML
//!
//! Every field has a default, so a file only needs the keys it changes.
//!
//! # YAML format
//!
//! ```yaml
//! simulation:
//!   simulation_time: 192426.0
//!   time_step: 10.0
//!   min_relative_time_step_reduction: 100.0
//!   adaptability:
//!     is_adaptive: true
//!     max_quantile: 4.0             # > 1 extrapolates past the observed max
//!     quantile_ignored_extremes: 10 # percent per tail
//!
//! plotting:
//!   plotting_time: 3.0
//!   refresh_rate: 20
//!
//! bodies:
//!   - mass: 1.0
//!     position: [0.0, 0.0, 0.5]
//!   - mass: 1.0
//!     position: [0.0, 0.0, -0.5]
//!
//! forces:
//!   pair:
//!     - kind: gravitational
//! ```
//!
//! The engine maps this into runtime types ([`Parameters`], [`Scenario`]).
//!
//! [`Parameters`]: crate::simulation::params::Parameters
//! [`Scenario`]: crate::simulation::scenario::Scenario

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SimError};
use crate::simulation::forces::GRAVITATIONAL_CONSTANT;

/// Time stepping and safety limits
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub simulation_time: f64, // how long the simulation lasts
    pub time_step: f64, // coarse step size
    pub max_allowed_force: Option<f64>, // cap on any force norm, unset = unlimited
    pub max_time_steps: usize, // refuse to run past this many coarse steps
    pub max_recursion_depth: usize, // refuse to subdivide deeper than this
    pub min_relative_time_step_reduction: Option<f64>, // min_time_step = time_step / this
    pub adaptability: AdaptabilityConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation_time: 10.0,
            time_step: 0.01,
            max_allowed_force: None,
            max_time_steps: 100_000,
            max_recursion_depth: 32,
            min_relative_time_step_reduction: None,
            adaptability: AdaptabilityConfig::default(),
        }
    }
}

/// Thresholds for the per-body step-quality gate.
/// Defaults leave every check disabled, so adaptive runs accept every step
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AdaptabilityConfig {
    pub is_adaptive: bool,
    pub max_absolute_value: f64, // infinite = disabled
    pub max_quantile: f64, // <= 0 = disabled, > 1 = extrapolated
    pub max_deviation: f64, // <= 0 = disabled
    pub max_relative_log_diff: f64, // deprecated, ignored
    pub min_time_step: Option<f64>, // overrides min_relative_time_step_reduction
    pub quantile_ignored_extremes: f64, // percent ignored on each tail when extrapolating
    pub history_window: Option<usize>, // keep only the most recent values
}

impl Default for AdaptabilityConfig {
    fn default() -> Self {
        Self {
            is_adaptive: true,
            max_absolute_value: f64::INFINITY,
            max_quantile: -1.0,
            max_deviation: 0.0,
            max_relative_log_diff: 0.0,
            min_time_step: None,
            quantile_ignored_extremes: 10.0,
            history_window: None,
        }
    }
}

/// Playback settings for whoever renders the position history
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PlottingConfig {
    pub plotting_time: f64, // how long playback lasts
    pub refresh_rate: u32, // frames per second of playback
    pub do_repeat: bool, // loop playback
    pub dot_sizes: DotSizesConfig,
}

impl Default for PlottingConfig {
    fn default() -> Self {
        Self {
            plotting_time: 10.0,
            refresh_rate: 20,
            do_repeat: false,
            dot_sizes: DotSizesConfig::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DotSizesConfig {
    pub min: f64, // size of the lightest body
    pub max: f64, // size a body `difference` orders of magnitude heavier gets
    pub difference: f64, // orders of magnitude of mass spanned by [min, max]
    pub exponent_factor: f64, // < 1 compresses large mass ratios
}

impl Default for DotSizesConfig {
    fn default() -> Self {
        Self {
            min: 15.0,
            max: 75.0,
            difference: 6.0,
            exponent_factor: 0.666,
        }
    }
}

impl PlottingConfig {
    /// Reject settings that would make the dot-size scale degenerate
    pub fn validate(&self) -> Result<()> {
        if !(self.plotting_time.is_finite() && self.plotting_time >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "plotting_time must be finite and non-negative, got {}",
                self.plotting_time
            )));
        }
        let d = &self.dot_sizes;
        if !(d.difference.is_finite() && d.difference > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "dot_sizes.difference must be finite and positive, got {}",
                d.difference
            )));
        }
        if !(d.min.is_finite() && d.max.is_finite() && d.exponent_factor.is_finite()) {
            return Err(SimError::InvalidConfig("dot_sizes must be finite".into()));
        }
        Ok(())
    }

    pub fn number_of_plotting_steps(&self) -> usize {
        (self.plotting_time * f64::from(self.refresh_rate)) as usize
    }

    /// Stride through the history so `number_of_time_steps` fit in playback
    pub fn plotting_relative_time_step(&self, number_of_time_steps: usize) -> usize {
        let frames = self.plotting_time * f64::from(self.refresh_rate);
        if frames <= 0.0 {
            return 1;
        }
        ((number_of_time_steps as f64 / frames).ceil() as usize).max(1)
    }

    pub fn size_per_difference(&self) -> f64 {
        let d = &self.dot_sizes;
        (d.max - d.min) / d.difference
    }

    /// Dot size for each mass.
    ///
    /// Sizes follow log10(mass) relative to the lightest body. Spreads wider
    /// than `difference` are squeezed into it. A dot's area grows slower than
    /// its mass, so the result is pulled towards a geometric mean with
    /// `exponent_factor`.
    pub fn dot_sizes(&self, masses: &[f64]) -> Vec<f64> {
        let d = &self.dot_sizes;
        let logs: Vec<f64> = masses.iter().map(|m| m.log10()).collect();
        let min = logs.iter().copied().fold(f64::INFINITY, f64::min);
        let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let spread = max - min;

        logs.iter()
            .map(|l| {
                let relative = if spread <= d.difference {
                    l - min
                } else {
                    (l - min) * d.difference / spread
                };
                let geometric = relative.powf(d.exponent_factor)
                    * d.difference.powf(1.0 - d.exponent_factor);
                geometric * self.size_per_difference() + d.min
            })
            .collect()
    }
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub mass: f64,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub velocity: [f64; 3],
    #[serde(default)]
    pub acceleration: [f64; 3], // initial, not counting the field
    #[serde(default)]
    pub acceleration_field: [f64; 3], // constant, re-applied every step
}

/// Which forces act in the scenario
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ForcesConfig {
    pub single: Vec<SingleForceConfig>,
    pub pair: Vec<PairForceConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SingleForceConfig {
    Viscosity {
        #[serde(default = "unit")]
        constant: f64,
    },
    CrossVelocity {
        #[serde(default = "down_y")]
        field: [f64; 3],
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairForceConfig {
    Gravitational {
        #[serde(default = "gravitational_constant")]
        constant: f64,
    },
    CinematicAttraction {
        #[serde(default = "unit")]
        constant: f64,
    },
}

fn unit() -> f64 {
    1.0
}

fn down_y() -> [f64; 3] {
    [0.0, -1.0, 0.0]
}

fn gravitational_constant() -> f64 {
    GRAVITATIONAL_CONSTANT
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub simulation: SimulationConfig,
    pub plotting: PlottingConfig,
    pub bodies: Vec<BodyConfig>,
    pub forces: ForcesConfig,
}

impl ScenarioConfig {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}
