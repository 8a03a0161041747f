pub mod error;
pub mod simulation;
pub mod configuration;

pub use error::{Result, SimError};

pub use simulation::states::{Body, HistoryMode, NVec3};
pub use simulation::adaptability::{AdaptabilityController, CheckState};
pub use simulation::forces::{
    ForceSet, PairForce, SingleForce, Gravitational, CinematicAttraction, Viscosity, CrossVelocity,
    GRAVITATIONAL_CONSTANT, GRAVITY_FIELD,
};
pub use simulation::params::{AdaptabilityParams, Parameters};
pub use simulation::system::BodySystem;
pub use simulation::scenario::{Preset, Scenario};

pub use configuration::config::{
    AdaptabilityConfig, BodyConfig, ForcesConfig, PairForceConfig, PlottingConfig, ScenarioConfig,
    SimulationConfig, SingleForceConfig,
};
