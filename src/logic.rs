// src/logic.rs
// Numerical integration of the double-pendulum ODE onto a fixed time grid.
// Two methods are available:
//   - Rk4: classical fixed-step RK4, with `substeps` equal steps between consecutive grid samples.
//   - Dopri5: Dormand–Prince 5(4) with embedded error control. Steps are clamped so every grid
//     sample is hit exactly, so no dense-output interpolation is needed.
// The grid is never modified and nothing is retried. A state that turns NaN/∞ is recorded and carried
// to the end of the trajectory. An exhausted step budget, or a cancellation, fills the rest with NaN.
// In every case the result has one state per grid point.

use crate::math;
use crate::model::{
    IntegrationStats, IntegrationStatus, PendulumParameters, PendulumState, TimeGrid, Trajectory,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Right-hand side `y' = f(t, y)` of a 4-dimensional first-order system.
pub trait Dynamics {
    fn deriv(&self, y: &[f64; 4], t: f64) -> [f64; 4];
}

impl Dynamics for PendulumParameters {
    fn deriv(&self, y: &[f64; 4], _t: f64) -> [f64; 4] {
        // Autonomous system: t is unused.
        math::derivatives(y, self)
    }
}

/// Integration method and its tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Method {
    /// Fixed-step RK4 with `substeps` steps per grid interval.
    Rk4 { substeps: usize },
    /// Adaptive Dormand–Prince 5(4). `max_steps` bounds the attempted steps per grid interval.
    Dopri5 {
        rtol: f64,
        atol: f64,
        max_steps: usize,
    },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Rk4 { .. } => "rk4",
            Method::Dopri5 { .. } => "dopri5",
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Dopri5 {
            rtol: 1e-9,
            atol: 1e-9,
            max_steps: 10_000,
        }
    }
}

/// Cooperative cancellation flag, checked between grid samples.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Single RK4 step: y_{t+h} = y + (h/6)(k1 + 2k2 + 2k3 + k4).
pub fn rk4_step<F: Dynamics>(f: &F, y: &[f64; 4], t: f64, h: f64) -> [f64; 4] {
    let k1 = f.deriv(y, t);
    let k2 = f.deriv(&axpy(y, 0.5 * h, &k1), t + 0.5 * h);
    let k3 = f.deriv(&axpy(y, 0.5 * h, &k2), t + 0.5 * h);
    let k4 = f.deriv(&axpy(y, h, &k3), t + h);
    let mut y_new = [0.0; 4];
    for i in 0..4 {
        y_new[i] = y[i] + (h / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    y_new
}

/// `y + a·x`, component-wise.
fn axpy(y: &[f64; 4], a: f64, x: &[f64; 4]) -> [f64; 4] {
    [
        y[0] + a * x[0],
        y[1] + a * x[1],
        y[2] + a * x[2],
        y[3] + a * x[3],
    ]
}

fn all_finite(y: &[f64; 4]) -> bool {
    y.iter().all(|v| v.is_finite())
}

/// Outcome of advancing across one grid interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Reached,
    NonFinite,
    Exhausted,
}

// Dormand–Prince 5(4) tableau.
const C2: f64 = 0.2;
const C3: f64 = 0.3;
const C4: f64 = 0.8;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 0.2;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Step-size controller constants.
const SAFETY: f64 = 0.9;
const FAC_MIN: f64 = 0.2; // hnew/h >= 0.2
const FAC_MAX: f64 = 10.0; // hnew/h <= 10
const BETA: f64 = 0.04; // Lund stabilization.
const UROUND: f64 = 2.3e-16;

/// Adaptive stepper state carried from one grid interval to the next.
struct Dopri5Stepper {
    rtol: f64,
    atol: f64,
    max_steps: usize,
    h: f64,                // Step size proposed for the next attempt.
    facold: f64,           // Previous accepted error, for Lund stabilization.
    k1: Option<[f64; 4]>, // FSAL derivative at the current state.
}

impl Dopri5Stepper {
    fn new(rtol: f64, atol: f64, max_steps: usize, h0: f64) -> Self {
        Self {
            rtol,
            atol,
            max_steps,
            h: h0,
            facold: 1e-4,
            k1: None,
        }
    }

    /// Advances `y` from `t0` to exactly `t1`.
    fn advance<F: Dynamics>(
        &mut self,
        f: &F,
        t0: f64,
        t1: f64,
        y: &mut [f64; 4],
        stats: &mut IntegrationStats,
    ) -> Advance {
        if t1 == t0 {
            return Advance::Reached;
        }
        let expo1 = 0.2 - BETA * 0.75;
        let mut t = t0;
        let mut reject = false;
        let mut k1 = match self.k1 {
            Some(k) => k,
            None => {
                stats.nfev += 1;
                f.deriv(y, t)
            }
        };

        for _ in 0..self.max_steps {
            // Clamp the step so the interval end is hit exactly.
            let proposed = self.h;
            let mut h = proposed;
            let mut last = false;
            if t + 1.01 * h >= t1 {
                h = t1 - t;
                last = true;
            }
            if h <= 10.0 * UROUND * t.abs().max(1.0) {
                self.k1 = None;
                return Advance::Exhausted;
            }

            let y2 = axpy(y, h * A21, &k1);
            let k2 = f.deriv(&y2, t + C2 * h);

            let mut ys = [0.0; 4];
            for i in 0..4 {
                ys[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
            }
            let k3 = f.deriv(&ys, t + C3 * h);

            for i in 0..4 {
                ys[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
            }
            let k4 = f.deriv(&ys, t + C4 * h);

            for i in 0..4 {
                ys[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
            }
            let k5 = f.deriv(&ys, t + C5 * h);

            for i in 0..4 {
                ys[i] = y[i]
                    + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
            }
            let k6 = f.deriv(&ys, t + h);

            let mut y_new = [0.0; 4];
            for i in 0..4 {
                y_new[i] = y[i]
                    + h * (A71 * k1[i] + A73 * k3[i] + A74 * k4[i] + A75 * k5[i] + A76 * k6[i]);
            }
            let k7 = f.deriv(&y_new, t + h);
            stats.nfev += 6;

            // Embedded error estimate, RMS-scaled by the mixed tolerance.
            let mut err = 0.0;
            for i in 0..4 {
                let e = h
                    * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
                let sk = self.atol + self.rtol * y[i].abs().max(y_new[i].abs());
                err += (e / sk) * (e / sk);
            }
            let err = (err / 4.0).sqrt();

            if !err.is_finite() {
                if all_finite(&y_new) {
                    // Only the derivative at the new point blew up: retry with a smaller step.
                    stats.rejected += 1;
                    reject = true;
                    self.h = h * FAC_MIN;
                    continue;
                }
                // No retry: the degenerate state becomes part of the trajectory.
                stats.accepted += 1;
                *y = y_new;
                self.k1 = None;
                return Advance::NonFinite;
            }

            let fac11 = err.powf(expo1);
            let fac = (fac11 / self.facold.powf(BETA) / SAFETY).clamp(1.0 / FAC_MAX, 1.0 / FAC_MIN);
            let mut hnew = h / fac;

            if err <= 1.0 {
                stats.accepted += 1;
                self.facold = err.max(1e-4);
                *y = y_new;
                k1 = k7;
                if !all_finite(y) {
                    self.k1 = None;
                    return Advance::NonFinite;
                }
                if reject {
                    hnew = hnew.min(h);
                }
                if last {
                    // A clamped final step says little about the natural step size.
                    self.h = if h < proposed { proposed } else { hnew };
                    self.k1 = Some(k1);
                    return Advance::Reached;
                }
                t += h;
                reject = false;
            } else {
                stats.rejected += 1;
                hnew = h / (1.0 / FAC_MIN).min(fac11 / SAFETY);
                reject = true;
            }
            self.h = hnew;
        }

        self.k1 = None;
        Advance::Exhausted
    }
}

enum Stepper {
    Rk4 { substeps: usize },
    Dopri5(Dopri5Stepper),
}

impl Stepper {
    fn new(method: &Method, dt: f64) -> Self {
        match *method {
            Method::Rk4 { substeps } => Stepper::Rk4 {
                substeps: substeps.max(1),
            },
            Method::Dopri5 {
                rtol,
                atol,
                max_steps,
            } => Stepper::Dopri5(Dopri5Stepper::new(rtol, atol, max_steps, dt)),
        }
    }

    fn advance<F: Dynamics>(
        &mut self,
        f: &F,
        t0: f64,
        t1: f64,
        y: &mut [f64; 4],
        stats: &mut IntegrationStats,
    ) -> Advance {
        match self {
            Stepper::Rk4 { substeps } => {
                let h = (t1 - t0) / *substeps as f64;
                let mut t = t0;
                for _ in 0..*substeps {
                    *y = rk4_step(f, y, t, h);
                    t += h;
                }
                stats.nfev += 4 * *substeps;
                stats.accepted += *substeps;
                if all_finite(y) {
                    Advance::Reached
                } else {
                    Advance::NonFinite
                }
            }
            Stepper::Dopri5(stepper) => stepper.advance(f, t0, t1, y, stats),
        }
    }
}

/// Double-pendulum solver: fixed parameters plus a method, integrates onto a `TimeGrid`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoublePendulumSolver {
    pub params: PendulumParameters,
    pub method: Method,
}

impl DoublePendulumSolver {
    pub fn new(params: PendulumParameters, method: Method) -> Self {
        Self { params, method }
    }

    /// dy/dt for `y = [θ1, ω1, θ2, ω2]`.
    pub fn deriv(&self, y: &[f64; 4], t: f64) -> [f64; 4] {
        self.params.deriv(y, t)
    }

    /// Integrates from `initial` across `grid`. `trajectory[0] == initial`.
    pub fn solve(&self, initial: PendulumState, grid: &TimeGrid) -> Trajectory {
        self.solve_with_cancel(initial, grid, None)
    }

    /// Same as [`solve`](Self::solve), checking `cancel` before each grid interval.
    pub fn solve_with_cancel(
        &self,
        initial: PendulumState,
        grid: &TimeGrid,
        cancel: Option<&CancelToken>,
    ) -> Trajectory {
        let (states, status, stats) =
            integrate_system(&self.params, initial.to_array(), grid, &self.method, cancel);
        debug!(
            method = self.method.name(),
            samples = grid.len(),
            nfev = stats.nfev,
            accepted = stats.accepted,
            rejected = stats.rejected,
            status = ?status,
            "integration finished"
        );
        let states = states.into_iter().map(PendulumState::from_array).collect();
        Trajectory::new(*grid, states, status, stats)
    }
}

/// Convenience wrapper around [`DoublePendulumSolver::solve`].
pub fn integrate(
    params: &PendulumParameters,
    initial: PendulumState,
    grid: &TimeGrid,
    method: &Method,
) -> Trajectory {
    DoublePendulumSolver::new(*params, *method).solve(initial, grid)
}

/// Integrates any 4-dimensional system onto `grid`, returning one state per sample.
pub fn integrate_system<F: Dynamics>(
    f: &F,
    y0: [f64; 4],
    grid: &TimeGrid,
    method: &Method,
    cancel: Option<&CancelToken>,
) -> (Vec<[f64; 4]>, IntegrationStatus, IntegrationStats) {
    let n = grid.len();
    let mut stats = IntegrationStats::default();
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return (out, IntegrationStatus::Completed, stats);
    }

    let mut y = y0;
    out.push(y);
    let mut status = if all_finite(&y) {
        IntegrationStatus::Completed
    } else {
        IntegrationStatus::NonFinite { first_index: 0 }
    };

    let mut stepper = Stepper::new(method, grid.dt());

    for i in 1..n {
        // Once non-finite, the derivative cannot recover; carry the state forward as-is.
        if !all_finite(&y) {
            out.push(y);
            continue;
        }
        if cancel.is_some_and(CancelToken::is_cancelled) {
            status = IntegrationStatus::Cancelled { at_index: i };
            break;
        }

        let (t0, t1) = (grid.time(i - 1), grid.time(i));
        match stepper.advance(f, t0, t1, &mut y, &mut stats) {
            Advance::Reached | Advance::NonFinite => {
                if !all_finite(&y) && status.is_completed() {
                    status = IntegrationStatus::NonFinite { first_index: i };
                }
                out.push(y);
            }
            Advance::Exhausted => {
                warn!(index = i, t = t1, "step budget exhausted before grid sample");
                status = IntegrationStatus::StepLimit { index: i };
                break;
            }
        }
    }

    // Keep one entry per grid point even when stopped early.
    out.resize(n, [f64::NAN; 4]);
    (out, status, stats)
}
