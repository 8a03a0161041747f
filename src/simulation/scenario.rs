//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing, or one of the built-in
//! [`Preset`]s) and produces a runtime `Scenario` containing:
//! - resolved numerical parameters (`Parameters`)
//! - playback settings for a viewer (`PlottingConfig`)
//! - the system state (`BodySystem` with bodies at t = 0 and its forces)

use std::f64::consts::PI;

use clap::ValueEnum;
use nalgebra::{Rotation3, Vector3};

use crate::configuration::config::{
    AdaptabilityConfig, BodyConfig, DotSizesConfig, ForcesConfig, PairForceConfig, PlottingConfig,
    ScenarioConfig, SimulationConfig, SingleForceConfig,
};
use crate::error::Result;
use crate::simulation::forces::{
    CinematicAttraction, CrossVelocity, ForceSet, Gravitational, Viscosity,
    GRAVITATIONAL_CONSTANT, GRAVITY_FIELD,
};
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, NVec3};
use crate::simulation::system::BodySystem;

/// Runtime bundle: everything needed to run and play back one scenario
pub struct Scenario {
    pub parameters: Parameters,
    pub plotting: PlottingConfig,
    pub system: BodySystem,
}

impl Scenario {
    pub fn build(cfg: ScenarioConfig) -> Result<Self> {
        let parameters = Parameters::from_config(&cfg.simulation)?;
        cfg.plotting.validate()?;
        let forces = build_forces(&cfg.forces).with_max_force(parameters.max_allowed_force);

        let mut system = BodySystem::new(parameters.clone(), forces);
        for bc in &cfg.bodies {
            // Bodies: map `BodyConfig` -> runtime `Body` using nalgebra vectors
            let body = Body::new(bc.mass)?
                .with_adaptability(parameters.adaptability.clone())
                .with_field(NVec3::from(bc.acceleration_field))
                .with_acceleration(NVec3::from(bc.acceleration))
                .with_position(NVec3::from(bc.position))
                .with_velocity(NVec3::from(bc.velocity));
            system.add_body(body);
        }

        Ok(Self {
            parameters,
            plotting: cfg.plotting,
            system,
        })
    }

    /// Run the configured number of coarse steps
    pub fn run(&mut self) -> Result<()> {
        self.system
            .run(self.parameters.number_of_steps, self.parameters.time_step)
    }

    /// History stride that fits the run into the configured playback
    pub fn plotting_stride(&self) -> usize {
        self.plotting
            .plotting_relative_time_step(self.parameters.number_of_steps)
    }
}

fn build_forces(cfg: &ForcesConfig) -> ForceSet {
    let mut forces = ForceSet::new();
    for single in &cfg.single {
        forces = match *single {
            SingleForceConfig::Viscosity { constant } => forces.with_single(Viscosity { constant }),
            SingleForceConfig::CrossVelocity { field } => forces.with_single(CrossVelocity {
                field: NVec3::from(field),
            }),
        };
    }
    for pair in &cfg.pair {
        forces = match *pair {
            PairForceConfig::Gravitational { constant } => forces.with_pair(Gravitational { constant }),
            PairForceConfig::CinematicAttraction { constant } => {
                forces.with_pair(CinematicAttraction { constant })
            }
        };
    }
    forces
}

// =========================================================================================
// Built-in scenarios
// =========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// One unit mass thrown sideways in Earth gravity
    FreeFall,
    /// Two unit masses released at rest 1 m apart under Newtonian gravity
    TwoBodiesFromRest,
    /// Same pair with a coarser step and an absolute velocity-differential cap
    TwoBodiesFromRestAdaptive,
    /// Three bodies on symmetric ellipses, 120 degrees apart
    ThreeEllipticalOrbits,
    /// Sun to Mars, one year in steps of 0.1 days
    SolarSystem,
    /// Two bodies orbiting each other while a viscous drag slows them
    OrbitingDecelerating,
    /// One body pushed into a circle by a cross-velocity force
    CircularMotion,
    /// The circle with drag: the body spirals in
    CircularMotionDecelerating,
    /// The circle with a constant field: the body drifts along z
    CircularMotionAccelerated,
}

impl Preset {
    pub fn config(self) -> ScenarioConfig {
        match self {
            Preset::FreeFall => free_fall(),
            Preset::TwoBodiesFromRest => two_bodies_from_rest(),
            Preset::TwoBodiesFromRestAdaptive => two_bodies_from_rest_adaptive(),
            Preset::ThreeEllipticalOrbits => three_elliptical_orbits(),
            Preset::SolarSystem => solar_system(),
            Preset::OrbitingDecelerating => orbiting_decelerating(),
            Preset::CircularMotion => circular_motion(Vec::new(), [0.0; 3]),
            Preset::CircularMotionDecelerating => circular_motion(
                vec![SingleForceConfig::Viscosity { constant: 0.1 }],
                [0.0; 3],
            ),
            Preset::CircularMotionAccelerated => circular_motion(Vec::new(), [0.0, 0.0, -0.2]),
        }
    }
}

fn body(mass: f64, position: NVec3, velocity: NVec3) -> BodyConfig {
    BodyConfig {
        mass,
        position: position.into(),
        velocity: velocity.into(),
        acceleration: [0.0; 3],
        acceleration_field: [0.0; 3],
    }
}

fn fixed_step(simulation_time: f64, time_step: f64) -> SimulationConfig {
    SimulationConfig {
        simulation_time,
        time_step,
        adaptability: AdaptabilityConfig {
            is_adaptive: false,
            ..AdaptabilityConfig::default()
        },
        ..SimulationConfig::default()
    }
}

fn free_fall() -> ScenarioConfig {
    let mut falling = body(1.0, NVec3::zeros(), NVec3::new(1.0, 0.0, 0.0));
    falling.acceleration_field = GRAVITY_FIELD.into();
    ScenarioConfig {
        simulation: fixed_step(2.0, 0.01),
        bodies: vec![falling],
        ..ScenarioConfig::default()
    }
}

fn two_bodies(half_distance: NVec3) -> Vec<BodyConfig> {
    vec![
        body(1.0, half_distance, NVec3::zeros()),
        body(1.0, -half_distance, NVec3::zeros()),
    ]
}

fn gravity_only() -> ForcesConfig {
    ForcesConfig {
        single: Vec::new(),
        pair: vec![PairForceConfig::Gravitational {
            constant: GRAVITATIONAL_CONSTANT,
        }],
    }
}

fn two_bodies_from_rest() -> ScenarioConfig {
    ScenarioConfig {
        simulation: SimulationConfig {
            simulation_time: 96_213.0 * 2.0,
            time_step: 10.0,
            min_relative_time_step_reduction: Some(1e2),
            adaptability: AdaptabilityConfig {
                is_adaptive: true,
                max_quantile: 4.0,
                quantile_ignored_extremes: 10.0,
                ..AdaptabilityConfig::default()
            },
            ..SimulationConfig::default()
        },
        plotting: PlottingConfig {
            plotting_time: 3.0,
            ..PlottingConfig::default()
        },
        bodies: two_bodies(NVec3::new(0.0, 0.0, 0.5)),
        forces: gravity_only(),
    }
}

fn two_bodies_from_rest_adaptive() -> ScenarioConfig {
    ScenarioConfig {
        simulation: SimulationConfig {
            simulation_time: 96_213.0 * 2.0,
            time_step: 100.0,
            adaptability: AdaptabilityConfig {
                is_adaptive: true,
                max_absolute_value: 5e-5,
                ..AdaptabilityConfig::default()
            },
            ..SimulationConfig::default()
        },
        plotting: PlottingConfig {
            plotting_time: 3.0,
            ..PlottingConfig::default()
        },
        bodies: two_bodies(NVec3::new(0.0, 0.0, 0.5)),
        forces: gravity_only(),
    }
}

fn three_elliptical_orbits() -> ScenarioConfig {
    let distance = NVec3::new(0.0, 0.0, 2.0);
    let velocity = NVec3::new(-0.3, 0.0, 0.0);

    let bodies = (0..3_u32)
        .map(|k| {
            let rot = Rotation3::from_axis_angle(&Vector3::y_axis(), 2.0 * PI * f64::from(k) / 3.0);
            body(1.0, rot * distance, rot * velocity)
        })
        .collect();

    ScenarioConfig {
        simulation: SimulationConfig {
            simulation_time: 40.0,
            time_step: 0.01,
            min_relative_time_step_reduction: Some(1e2),
            adaptability: AdaptabilityConfig {
                is_adaptive: true,
                max_quantile: 1.1,
                quantile_ignored_extremes: 15.0,
                ..AdaptabilityConfig::default()
            },
            ..SimulationConfig::default()
        },
        bodies,
        forces: ForcesConfig {
            single: Vec::new(),
            pair: vec![PairForceConfig::CinematicAttraction { constant: 1.0 }],
        },
        ..ScenarioConfig::default()
    }
}

fn solar_system() -> ScenarioConfig {
    // mass [kg], distance to the sun [m], orbital speed [m/s]
    const PLANETS: [(f64, f64, f64); 6] = [
        (1.989e30, 0.0, 0.0), // sun
        (3.285e23, 47e9, 58.97e3), // mercury
        (4.87e24, 107.48e9, 36.259e3), // venus
        (5.972e24, 147.098e9, 30.29e3), // earth
        (6.4169e23, 206.62e9, 26.50e3), // mars
        (7.342e22, 147.098e9 + 363e6, 30.29e3 + 1.082e3), // moon
    ];

    ScenarioConfig {
        simulation: SimulationConfig {
            simulation_time: 3.156e7,
            time_step: 8640.0,
            adaptability: AdaptabilityConfig {
                is_adaptive: true,
                max_absolute_value: 200.0,
                ..AdaptabilityConfig::default()
            },
            ..SimulationConfig::default()
        },
        plotting: PlottingConfig {
            dot_sizes: DotSizesConfig {
                difference: 12.0,
                exponent_factor: 0.66,
                ..Default::default()
            },
            ..PlottingConfig::default()
        },
        bodies: PLANETS
            .iter()
            .map(|&(m, x, v)| body(m, NVec3::new(x, 0.0, 0.0), NVec3::new(0.0, 0.0, v)))
            .collect(),
        forces: gravity_only(),
    }
}

fn orbiting_decelerating() -> ScenarioConfig {
    let position = NVec3::new(0.0, 0.0, 1.0);
    let velocity = NVec3::new(0.5, 0.0, 0.0); // perpendicular to the position for a circular orbit
    ScenarioConfig {
        simulation: fixed_step(40.0, 0.01),
        bodies: vec![body(1.0, position, velocity), body(1.0, -position, -velocity)],
        forces: ForcesConfig {
            single: vec![SingleForceConfig::Viscosity { constant: 0.1 }],
            pair: vec![PairForceConfig::CinematicAttraction { constant: 1.0 }],
        },
        ..ScenarioConfig::default()
    }
}

fn circular_motion(extra: Vec<SingleForceConfig>, field: [f64; 3]) -> ScenarioConfig {
    let mut single = vec![SingleForceConfig::CrossVelocity { field: [0.0, -1.0, 0.0] }];
    single.extend(extra);

    let mut particle = body(1.0, NVec3::new(0.0, 0.0, 1.0), NVec3::new(1.0, 0.0, 0.0));
    particle.acceleration_field = field;

    ScenarioConfig {
        simulation: fixed_step(40.0, 0.01),
        bodies: vec![particle],
        forces: ForcesConfig { single, pair: Vec::new() },
        ..ScenarioConfig::default()
    }
}
