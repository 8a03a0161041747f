//! Force contributors for the simulation
//!
//! Forces come in two shapes:
//! - [`SingleForce`]: a pure function of one body's state (viscosity, ...)
//! - [`PairForce`]: a pure function of two bodies' states, returning the
//!   force on the first body. The system applies it as `+F` to the first and
//!   `-F` to the second, so momentum is conserved by construction.
//!
//! [`ForceSet`] holds the ordered lists of both, plus an optional cap on the
//! magnitude of every computed force.

use crate::simulation::states::{Body, NVec3};

/// Gravitational constant [m^3 kg^-1 s^-2]
pub const GRAVITATIONAL_CONSTANT: f64 = 6.67430e-11;

/// Earth surface gravity [m/s^2], pointing down the z axis
pub const GRAVITY_FIELD: NVec3 = NVec3::new(0.0, 0.0, -9.81);

/// Trait for forces acting on a single body
pub trait SingleForce {
    fn force(&self, body: &Body) -> NVec3;
}

/// Trait for forces between two bodies.
/// Returns the force felt by `first`; `second` feels its negation
pub trait PairForce {
    fn force(&self, first: &Body, second: &Body) -> NVec3;
}

/// Collection of single-body and pairwise force terms
#[derive(Default)]
pub struct ForceSet {
    single: Vec<Box<dyn SingleForce + Send + Sync>>,
    pair: Vec<Box<dyn PairForce + Send + Sync>>,
    max_force: Option<f64>,
}

impl ForceSet {
    /// Create an empty force set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-body force term
    pub fn with_single(mut self, term: impl SingleForce + Send + Sync + 'static) -> Self {
        self.single.push(Box::new(term));
        self
    }

    /// Add a pairwise force term
    pub fn with_pair(mut self, term: impl PairForce + Send + Sync + 'static) -> Self {
        self.pair.push(Box::new(term));
        self
    }

    /// Cap the norm of every computed force (direction is preserved)
    pub fn with_max_force(mut self, max_force: Option<f64>) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn max_force(&self) -> Option<f64> {
        self.max_force
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.pair.is_empty()
    }

    /// Apply every single force to every body, then every pair force once
    /// per unordered pair `(i, j)`, `i < j`, in index order
    pub fn apply_all(&self, bodies: &mut [Body]) {
        for body in bodies.iter_mut() {
            for term in &self.single {
                let f = self.limited(term.force(body));
                body.apply_force(f);
            }
        }

        let n = bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                for term in &self.pair {
                    let f = self.limited(term.force(&bodies[i], &bodies[j]));
                    bodies[i].apply_force(f);
                    bodies[j].apply_force(-f);
                }
            }
        }
    }

    fn limited(&self, force: NVec3) -> NVec3 {
        match self.max_force {
            Some(max) => limit_norm(force, max),
            None => force,
        }
    }
}

/// Scale `v` down to norm `max` if it is longer
pub fn limit_norm(v: NVec3, max: f64) -> NVec3 {
    let norm = v.norm();
    if norm > max {
        v * (max / norm)
    } else {
        v
    }
}

/// Unit vector from `from` to `to`, or `None` when the points coincide
fn direction(from: &NVec3, to: &NVec3) -> Option<(NVec3, f64)> {
    let r = to - from;
    let distance = r.norm();
    if distance == 0.0 {
        None
    } else {
        Some((r / distance, distance))
    }
}

// =========================================================================================
// Pair forces
// =========================================================================================

/// Newtonian gravity: G m1 m2 / d^2 toward the other body
pub struct Gravitational {
    pub constant: f64,
}

impl Default for Gravitational {
    fn default() -> Self {
        Self { constant: GRAVITATIONAL_CONSTANT }
    }
}

impl PairForce for Gravitational {
    fn force(&self, first: &Body, second: &Body) -> NVec3 {
        match direction(&first.position, &second.position) {
            Some((dir, d)) => dir * (self.constant * first.mass() * second.mass() / (d * d)),
            None => NVec3::zeros(), // no direction at zero separation
        }
    }
}

/// Mass-independent attraction c / d^2, handy for kinematic test scenes
pub struct CinematicAttraction {
    pub constant: f64,
}

impl Default for CinematicAttraction {
    fn default() -> Self {
        Self { constant: 1.0 }
    }
}

impl PairForce for CinematicAttraction {
    fn force(&self, first: &Body, second: &Body) -> NVec3 {
        match direction(&first.position, &second.position) {
            Some((dir, d)) => dir * (self.constant / (d * d)),
            None => NVec3::zeros(),
        }
    }
}

// =========================================================================================
// Single forces
// =========================================================================================

/// Linear drag: -c v
pub struct Viscosity {
    pub constant: f64,
}

impl Default for Viscosity {
    fn default() -> Self {
        Self { constant: 1.0 }
    }
}

impl SingleForce for Viscosity {
    fn force(&self, body: &Body) -> NVec3 {
        -body.velocity * self.constant
    }
}

/// v x field, perpendicular to both the velocity and the field.
/// With a field normal to the velocity this produces circular motion
pub struct CrossVelocity {
    pub field: NVec3,
}

impl Default for CrossVelocity {
    fn default() -> Self {
        Self { field: NVec3::new(0.0, -1.0, 0.0) }
    }
}

impl SingleForce for CrossVelocity {
    fn force(&self, body: &Body) -> NVec3 {
        body.velocity.cross(&self.field)
    }
}
