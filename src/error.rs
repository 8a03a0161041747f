//! Error types for the simulation core and its configuration layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid mass {0}: bodies must have a finite, strictly positive mass")]
    InvalidMass(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Too many time steps ({steps} > {ceiling}), the history buffers could exhaust memory")]
    TooManySteps { steps: usize, ceiling: usize },

    #[error("Adaptive step could not make progress (subdivision factor {division} < 2)")]
    NoProgress { division: usize },

    #[error("Adaptive subdivision exceeded depth {depth} (sub-step {time_step})")]
    RecursionLimit { depth: usize, time_step: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
