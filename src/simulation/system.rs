//! # Body system and adaptive driver
//!
//! [`BodySystem`] owns an ordered collection of bodies and the force set
//! acting on them, and advances them in lockstep.
//!
//! One coarse step of size `dt` goes through:
//!
//! 1. **apply forces**: every single force on every body, then every pair
//!    force once per unordered pair in index order.
//! 2. **check**: every body's controller judges `dt`. The step is
//!    acceptable only if all bodies accept it.
//! 3. **integrate** (accepted): every body commits a step of `dt`.
//! 4. **subdivide** (rejected): the largest recommended factor `k` among
//!    the bodies splits `dt` into `k` sub-steps. Forces are refreshed
//!    between sub-steps, and each sub-step recurses into step 2.
//!
//! While subdividing, bodies stop writing their position history. The
//! position at the end of the coarse step is recorded once the recursion
//! unwinds. The history therefore holds exactly one entry per coarse step.
//! A coarse step that fails (depth limit, no progress) records nothing.

use log::{debug, info, trace};

use crate::error::{Result, SimError};
use crate::simulation::forces::ForceSet;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, NVec3};

pub struct BodySystem {
    bodies: Vec<Body>,
    forces: ForceSet,
    parameters: Parameters,
    life_time: f64,
    subdividing: bool, // any body currently inside a subdivision
}

impl BodySystem {
    pub fn new(parameters: Parameters, forces: ForceSet) -> Self {
        Self {
            bodies: Vec::new(),
            forces,
            parameters,
            life_time: 0.0,
            subdividing: false,
        }
    }

    /// Append a body; its index is its position in pairwise iteration
    pub fn add_body(&mut self, body: Body) -> usize {
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.add_body(body);
        self
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, index: usize) -> Option<&Body> {
        self.bodies.get(index)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn forces(&self) -> &ForceSet {
        &self.forces
    }

    /// Simulated time elapsed over committed coarse steps
    pub fn life_time(&self) -> f64 {
        self.life_time
    }

    pub fn is_subdividing(&self) -> bool {
        self.subdividing
    }

    pub fn total_momentum(&self) -> NVec3 {
        self.bodies.iter().map(Body::momentum).sum()
    }

    /// Every `stride`-th coarse step as one frame of positions in body order
    pub fn frames(&self, stride: usize) -> Vec<Vec<NVec3>> {
        let steps = self
            .bodies
            .iter()
            .map(|b| b.position_history().len())
            .min()
            .unwrap_or(0);
        (0..steps)
            .step_by(stride.max(1))
            .map(|t| self.bodies.iter().map(|b| b.position_history()[t]).collect())
            .collect()
    }

    // stepping ==============================================================================

    pub fn apply_all_forces(&mut self) {
        self.forces.apply_all(&mut self.bodies);
    }

    /// True only if every body accepts `time_step`. All bodies are checked,
    /// so each one's recommendation is current
    pub fn is_step_acceptable(&mut self, time_step: f64) -> bool {
        self.bodies
            .iter_mut()
            .fold(true, |ok, body| body.check_step(time_step).is_accepted() && ok)
    }

    /// Plain step: forces, then every body advances by `time_step`
    pub fn iterate_step(&mut self, time_step: f64) {
        self.apply_all_forces();
        self.advance_bodies(time_step);
        self.life_time += time_step;
    }

    /// Adaptive step: forces, then `time_step` split as often as the
    /// controllers ask for
    pub fn adaptive_iterate_step(&mut self, time_step: f64) -> Result<()> {
        self.apply_all_forces();
        if let Err(err) = self.recursive_advance(time_step, 0) {
            self.abort_subdivision();
            return Err(err);
        }
        self.finish_subdivision();
        self.life_time += time_step;
        Ok(())
    }

    /// Advance by `time_step`, assuming forces for the current state are applied
    fn recursive_advance(&mut self, time_step: f64, depth: usize) -> Result<()> {
        if self.is_step_acceptable(time_step) {
            self.advance_bodies(time_step);
            return Ok(());
        }

        if depth >= self.parameters.max_recursion_depth {
            return Err(SimError::RecursionLimit { depth, time_step });
        }

        let division = self
            .bodies
            .iter()
            .map(|b| b.adaptability().recommended_division())
            .max()
            .unwrap_or(1);
        if division < 2 {
            return Err(SimError::NoProgress { division });
        }

        self.begin_subdivision();
        let sub_step = time_step / division as f64;
        debug!("subdividing dt = {time_step:e} into {division} x {sub_step:e} (depth {depth})");

        self.recursive_advance(sub_step, depth + 1)?;
        for _ in 1..division {
            // state moved since the last force application
            self.apply_all_forces();
            self.recursive_advance(sub_step, depth + 1)?;
        }
        Ok(())
    }

    fn advance_bodies(&mut self, time_step: f64) {
        for body in self.bodies.iter_mut() {
            body.advance_step(time_step);
        }
    }

    fn begin_subdivision(&mut self) {
        if !self.subdividing {
            self.subdividing = true;
            for body in self.bodies.iter_mut() {
                body.begin_subdivision();
            }
        }
    }

    fn finish_subdivision(&mut self) {
        if self.subdividing {
            for body in self.bodies.iter_mut() {
                body.finish_subdivision();
            }
            self.subdividing = false;
        }
    }

    /// Leave subdivision without recording the unfinished coarse step
    fn abort_subdivision(&mut self) {
        if self.subdividing {
            for body in self.bodies.iter_mut() {
                body.abort_subdivision();
            }
            self.subdividing = false;
        }
    }

    // driver ==============================================================================

    /// Run `number_of_steps` coarse steps of `time_step`, adaptive or not
    /// according to the configured adaptability
    pub fn run(&mut self, number_of_steps: usize, time_step: f64) -> Result<()> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "time_step must be finite and positive, got {time_step}"
            )));
        }
        if number_of_steps > self.parameters.max_time_steps {
            return Err(SimError::TooManySteps {
                steps: number_of_steps,
                ceiling: self.parameters.max_time_steps,
            });
        }

        let adaptive = self.parameters.adaptability.is_adaptive;
        info!(
            "running {} bodies for {number_of_steps} steps of {time_step} ({})",
            self.bodies.len(),
            if adaptive { "adaptive" } else { "fixed step" }
        );

        for step in 0..number_of_steps {
            if adaptive {
                self.adaptive_iterate_step(time_step)?;
            } else {
                self.iterate_step(time_step);
            }
            trace!("step {step}: t = {}", self.life_time);
        }

        info!("finished at t = {}", self.life_time);
        Ok(())
    }
}
