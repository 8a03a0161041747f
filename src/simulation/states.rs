//! Core state types for the simulation.
//!
//! Defines the point mass `Body` and its kinematic state using `NVec3`.
//! A body integrates itself with a semi-implicit Euler step:
//! - velocity from the current acceleration,
//! - position from the mean of the pre-step and post-step velocity,
//! - acceleration reset to the constant field afterwards.
//!
//! Forces are step-local: whatever was applied since the last committed
//! step is consumed by the next one.

use nalgebra::Vector3;

use crate::error::{Result, SimError};
use crate::simulation::adaptability::{AdaptabilityController, CheckState};
use crate::simulation::params::AdaptabilityParams;

pub type NVec3 = Vector3<f64>;

/// Whether committed steps are written to the position history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    #[default]
    Recording,
    /// Inside an adaptive subdivision: sub-step positions are not coarse steps
    Subdividing,
}

#[derive(Debug, Clone)]
pub struct Body {
    mass: f64,
    pub position: NVec3,
    pub velocity: NVec3,
    pub acceleration: NVec3,
    acceleration_field: NVec3, // constant acceleration re-applied every step
    last_velocity: NVec3, // velocity before the last committed step
    last_acceleration: NVec3, // acceleration consumed by the last committed step
    position_history: Vec<NVec3>,
    life_time: f64,
    mode: HistoryMode,
    adaptability: AdaptabilityController,
}

impl Body {
    /// Body at rest at the origin with no field and adaptivity disabled
    pub fn new(mass: f64) -> Result<Self> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SimError::InvalidMass(mass));
        }
        Ok(Self {
            mass,
            position: NVec3::zeros(),
            velocity: NVec3::zeros(),
            acceleration: NVec3::zeros(),
            acceleration_field: NVec3::zeros(),
            last_velocity: NVec3::zeros(),
            last_acceleration: NVec3::zeros(),
            position_history: Vec::new(),
            life_time: 0.0,
            mode: HistoryMode::Recording,
            adaptability: AdaptabilityController::new(AdaptabilityParams::default()),
        })
    }

    pub fn with_position(mut self, position: NVec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: NVec3) -> Self {
        self.velocity = velocity;
        self.last_velocity = velocity;
        self
    }

    /// Initial acceleration, not counting the field
    pub fn with_acceleration(mut self, acceleration: NVec3) -> Self {
        self.acceleration = acceleration + self.acceleration_field;
        self
    }

    pub fn with_field(mut self, field: NVec3) -> Self {
        self.acceleration += field - self.acceleration_field;
        self.acceleration_field = field;
        self
    }

    pub fn with_adaptability(mut self, params: AdaptabilityParams) -> Self {
        self.adaptability = AdaptabilityController::new(params);
        self
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn acceleration_field(&self) -> NVec3 {
        self.acceleration_field
    }

    pub fn last_velocity(&self) -> NVec3 {
        self.last_velocity
    }

    pub fn last_acceleration(&self) -> NVec3 {
        self.last_acceleration
    }

    /// One position per committed coarse step
    pub fn position_history(&self) -> &[NVec3] {
        &self.position_history
    }

    pub fn life_time(&self) -> f64 {
        self.life_time
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    pub fn adaptability(&self) -> &AdaptabilityController {
        &self.adaptability
    }

    pub fn momentum(&self) -> NVec3 {
        self.velocity * self.mass
    }

    // forces ==============================================================================

    /// a += f / m
    pub fn apply_force(&mut self, force: NVec3) {
        self.acceleration += force / self.mass;
    }

    pub fn apply_acceleration(&mut self, acceleration: NVec3) {
        self.acceleration += acceleration;
    }

    // integration ========================================================================

    /// Velocity used to translate the body: mean of current and pre-step velocity
    pub fn velocity_to_apply(&self) -> NVec3 {
        (self.velocity + self.last_velocity) * 0.5
    }

    pub fn acceleration_to_apply(&self) -> NVec3 {
        self.acceleration
    }

    /// Velocity change the pending acceleration would cause over `time_step`
    pub fn velocity_differential(&self, time_step: f64) -> f64 {
        self.acceleration.norm() * time_step
    }

    /// Ask this body's controller whether `time_step` is acceptable
    pub fn check_step(&mut self, time_step: f64) -> CheckState {
        let acceleration = self.acceleration;
        self.adaptability
            .check_ok(time_step, |dt| acceleration.norm() * dt)
    }

    /// Commit one step of `time_step` using the accumulated acceleration
    pub fn advance_step(&mut self, time_step: f64) {
        if self.mode == HistoryMode::Recording {
            self.adaptability.store_value(self.velocity_differential(time_step));
        }

        // Kick: v_n+1 = v_n + a_n dt
        self.velocity += self.acceleration_to_apply() * time_step;

        // Drift: x_n+1 = x_n + (v_n + v_n+1)/2 dt
        self.position += self.velocity_to_apply() * time_step;

        self.store_current_state();
        self.life_time += time_step;
    }

    fn store_current_state(&mut self) {
        if self.mode == HistoryMode::Recording {
            self.position_history.push(self.position);
        }
        self.last_velocity = self.velocity;
        self.last_acceleration = self.acceleration;
        self.acceleration = self.acceleration_field;
    }

    /// Suppress history writes until [`Body::finish_subdivision`]
    pub fn begin_subdivision(&mut self) {
        self.mode = HistoryMode::Subdividing;
    }

    /// Leave subdivision, recording the position reached at the end of the coarse step
    pub fn finish_subdivision(&mut self) {
        if self.mode == HistoryMode::Subdividing {
            self.position_history.push(self.position);
            self.mode = HistoryMode::Recording;
        }
    }

    /// Leave subdivision without recording a position
    pub fn abort_subdivision(&mut self) {
        self.mode = HistoryMode::Recording;
    }
}
