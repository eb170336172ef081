// src/model.rs
// Data model for one double pendulum: the physical constants, the 4-component kinematic state,
// the fixed time grid the integrator samples on, and the trajectory / frame sequences that are
// handed to rendering once fully materialized.
// Angles are radians and never wrapped. Gravity is a field on the parameters (no process-wide constant),
// so every integration call is self-contained and can run on any thread.

use serde::{Deserialize, Serialize};

/// Standard gravitational acceleration in m/s².
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Default simulated horizon in seconds.
pub const DEFAULT_T_MAX: f64 = 20.0;

/// Default number of samples on the time grid.
pub const DEFAULT_SAMPLES: usize = 1000;

/// Physical constants of one double pendulum. Immutable for the duration of a run.
///
/// No positivity check happens here: non-positive masses or lengths are accepted and show up
/// as non-finite values in the integrated trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendulumParameters {
    pub l1: f64, // Length of the upper link (m).
    pub l2: f64, // Length of the lower link (m).
    pub m1: f64, // Mass of the upper bob (kg).
    pub m2: f64, // Mass of the lower bob (kg).
    pub g: f64,  // Gravitational acceleration (m/s²).
}

impl PendulumParameters {
    /// Creates parameters under standard gravity.
    pub fn new(l1: f64, l2: f64, m1: f64, m2: f64) -> Self {
        Self {
            l1,
            l2,
            m1,
            m2,
            g: STANDARD_GRAVITY,
        }
    }

    /// Returns a copy with a different gravitational acceleration.
    pub fn with_gravity(self, g: f64) -> Self {
        Self { g, ..self }
    }

    /// Reach of the fully extended pendulum, used for plot bounds.
    pub fn total_length(&self) -> f64 {
        self.l1 + self.l2
    }
}

impl Default for PendulumParameters {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }
}

/// Instantaneous state `(θ1, ω1, θ2, ω2)`.
///
/// The array form used by the integrator keeps the same ordering: `[θ1, ω1, θ2, ω2]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PendulumState {
    pub theta1: f64, // Angle of link 1 from the downward vertical (rad).
    pub omega1: f64, // Angular velocity of link 1 (rad/s).
    pub theta2: f64, // Angle of link 2 from the downward vertical (rad).
    pub omega2: f64, // Angular velocity of link 2 (rad/s).
}

impl PendulumState {
    pub fn new(theta1: f64, omega1: f64, theta2: f64, omega2: f64) -> Self {
        Self {
            theta1,
            omega1,
            theta2,
            omega2,
        }
    }

    /// Both links released from rest at the given angles (radians).
    pub fn at_rest(theta1: f64, theta2: f64) -> Self {
        Self::new(theta1, 0.0, theta2, 0.0)
    }

    /// Both links released from rest at the given angles (degrees).
    pub fn from_degrees(theta1_deg: f64, theta2_deg: f64) -> Self {
        Self::at_rest(theta1_deg.to_radians(), theta2_deg.to_radians())
    }

    /// A state with every component NaN.
    pub fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.theta1, self.omega1, self.theta2, self.omega2]
    }

    pub fn from_array(y: [f64; 4]) -> Self {
        Self::new(y[0], y[1], y[2], y[3])
    }

    /// True when no component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Uniform sample grid `linspace(0, t_max, samples)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    pub t_max: f64,
    pub samples: usize,
}

impl TimeGrid {
    pub fn new(t_max: f64, samples: usize) -> Self {
        Self { t_max, samples }
    }

    /// Spacing between consecutive samples; zero for a single-sample grid.
    pub fn dt(&self) -> f64 {
        if self.samples < 2 {
            0.0
        } else {
            self.t_max / (self.samples - 1) as f64
        }
    }

    /// Time of sample `i`. The last sample lands exactly on `t_max`.
    pub fn time(&self, i: usize) -> f64 {
        if self.samples >= 2 && i == self.samples - 1 {
            self.t_max
        } else {
            i as f64 * self.dt()
        }
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.samples).map(|i| self.time(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::new(DEFAULT_T_MAX, DEFAULT_SAMPLES)
    }
}

/// How an integration run ended. A trajectory always carries one state per grid point;
/// the status says whether (and from where) those states stop being meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Every sample is finite.
    Completed,
    /// The state became NaN/∞ at `first_index` and stays non-finite afterwards.
    NonFinite { first_index: usize },
    /// The adaptive solver ran out of steps (or step size) before reaching sample `index`;
    /// samples from `index` on are NaN.
    StepLimit { index: usize },
    /// Cancelled before sample `at_index`; samples from `at_index` on are NaN.
    Cancelled { at_index: usize },
}

impl IntegrationStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, IntegrationStatus::Completed)
    }
}

/// Work counters collected while integrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IntegrationStats {
    pub nfev: usize,     // Derivative evaluations.
    pub accepted: usize, // Accepted steps.
    pub rejected: usize, // Rejected steps (adaptive method only).
}

/// Time-ordered states of one integration run, one per grid sample. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    grid: TimeGrid,
    states: Vec<PendulumState>,
    status: IntegrationStatus,
    stats: IntegrationStats,
}

impl Trajectory {
    pub(crate) fn new(
        grid: TimeGrid,
        states: Vec<PendulumState>,
        status: IntegrationStatus,
        stats: IntegrationStats,
    ) -> Self {
        debug_assert_eq!(grid.len(), states.len());
        Self {
            grid,
            states,
            status,
            stats,
        }
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn states(&self) -> &[PendulumState] {
        &self.states
    }

    pub fn get(&self, i: usize) -> Option<&PendulumState> {
        self.states.get(i)
    }

    pub fn first(&self) -> Option<&PendulumState> {
        self.states.first()
    }

    pub fn last(&self) -> Option<&PendulumState> {
        self.states.last()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn status(&self) -> IntegrationStatus {
        self.status
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    /// Index of the first sample holding a NaN or infinite component.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.states.iter().position(|s| !s.is_finite())
    }

    pub fn is_finite(&self) -> bool {
        self.first_non_finite().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendulumState> {
        self.states.iter()
    }
}

/// Cartesian bob positions for one sample. The pivot sits at the origin and the pendulum
/// hangs toward negative y at θ = 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CartesianFrame {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CartesianFrame {
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Position of the lower bob.
    pub fn bob2(&self) -> (f64, f64) {
        (self.x2, self.y2)
    }
}

/// The scalar field an ensemble sweep perturbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetTarget {
    Theta1,
    Theta2,
    L1,
    L2,
    M1,
    M2,
}

impl OffsetTarget {
    pub const ALL: [OffsetTarget; 6] = [
        OffsetTarget::Theta1,
        OffsetTarget::Theta2,
        OffsetTarget::L1,
        OffsetTarget::L2,
        OffsetTarget::M1,
        OffsetTarget::M2,
    ];

    /// True for the two angle targets, whose offsets live on the state rather than the parameters.
    pub fn is_angle(&self) -> bool {
        matches!(self, OffsetTarget::Theta1 | OffsetTarget::Theta2)
    }

    /// Adds `offset` to the targeted field, leaving the other five untouched.
    pub fn apply(
        &self,
        params: PendulumParameters,
        state: PendulumState,
        offset: f64,
    ) -> (PendulumParameters, PendulumState) {
        let (mut p, mut s) = (params, state);
        match self {
            OffsetTarget::Theta1 => s.theta1 += offset,
            OffsetTarget::Theta2 => s.theta2 += offset,
            OffsetTarget::L1 => p.l1 += offset,
            OffsetTarget::L2 => p.l2 += offset,
            OffsetTarget::M1 => p.m1 += offset,
            OffsetTarget::M2 => p.m2 += offset,
        }
        (p, s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetTarget::Theta1 => "theta1",
            OffsetTarget::Theta2 => "theta2",
            OffsetTarget::L1 => "l1",
            OffsetTarget::L2 => "l2",
            OffsetTarget::M1 => "m1",
            OffsetTarget::M2 => "m2",
        }
    }
}

impl std::fmt::Display for OffsetTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
