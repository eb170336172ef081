// src/math.rs
// Equations of motion for the planar double pendulum (frictionless pivots, rigid massless links, point bobs).
// For two links the mass matrix inverse is written out in closed form, so there is no linear solve:
// the accelerations come straight from the two coupled expressions below.
// Everything here is pure. The integrator calls `derivatives` at intermediate stage states, and it
// must never panic or branch on degeneracy: a zero denominator yields NaN/∞, which is what downstream
// code looks for.

use crate::model::{PendulumParameters, PendulumState};

/// Shared denominator of the ω̇1 equation: `(m1+m2)·L1 − m2·L1·cos²δ`.
/// For positive masses this is bounded below by `m1·L1`; it reaches zero only for `m1 ≤ 0`.
pub fn den1(delta: f64, params: &PendulumParameters) -> f64 {
    let c = delta.cos();
    (params.m1 + params.m2) * params.l1 - params.m2 * params.l1 * c * c
}

/// Time derivative of `[θ1, ω1, θ2, ω2]`, returned in the same order.
pub fn derivatives(y: &[f64; 4], params: &PendulumParameters) -> [f64; 4] {
    let [theta1, omega1, theta2, omega2] = *y;
    let PendulumParameters { l1, l2, m1, m2, g } = *params;

    let delta = theta2 - theta1;
    let (sin_d, cos_d) = delta.sin_cos();
    let den1 = den1(delta, params);
    let den2 = (l2 / l1) * den1; // Division by zero here is intended to propagate.

    let domega1 = (m2 * l1 * omega1 * omega1 * sin_d * cos_d
        + m2 * g * theta2.sin() * cos_d
        + m2 * l2 * omega2 * omega2 * sin_d
        - (m1 + m2) * g * theta1.sin())
        / den1;

    let domega2 = (-m2 * l2 * omega2 * omega2 * sin_d * cos_d
        + (m1 + m2) * g * theta1.sin() * cos_d
        - (m1 + m2) * l1 * omega1 * omega1 * sin_d
        - (m1 + m2) * g * theta2.sin())
        / den2;

    [omega1, domega1, omega2, domega2]
}

/// Kinetic energy of both bobs.
pub fn kinetic_energy(state: &PendulumState, params: &PendulumParameters) -> f64 {
    let PendulumParameters { l1, l2, m1, m2, .. } = *params;
    let v1_sq = (l1 * state.omega1).powi(2);
    let cross = 2.0 * l1 * l2 * state.omega1 * state.omega2 * (state.theta1 - state.theta2).cos();
    let v2_sq = v1_sq + (l2 * state.omega2).powi(2) + cross;
    0.5 * m1 * v1_sq + 0.5 * m2 * v2_sq
}

/// Potential energy with zero at the pivot height.
pub fn potential_energy(state: &PendulumState, params: &PendulumParameters) -> f64 {
    let PendulumParameters { l1, l2, m1, m2, g } = *params;
    let y1 = -l1 * state.theta1.cos();
    let y2 = y1 - l2 * state.theta2.cos();
    m1 * g * y1 + m2 * g * y2
}

/// Total mechanical energy; conserved by the exact flow.
pub fn total_energy(state: &PendulumState, params: &PendulumParameters) -> f64 {
    kinetic_energy(state, params) + potential_energy(state, params)
}

/// Energy scale used to normalise drift: the depth of the hanging configuration,
/// `g·(m1·L1 + m2·(L1+L2))`. Total energy itself can sit at zero (both links horizontal),
/// so it makes a poor denominator.
pub fn energy_scale(params: &PendulumParameters) -> f64 {
    let PendulumParameters { l1, l2, m1, m2, g } = *params;
    (g * (m1 * l1 + m2 * (l1 + l2))).abs()
}

/// Energy drift between two states relative to [`energy_scale`].
/// Falls back to the absolute difference when the scale is zero. Non-finite inputs give a non-finite result.
pub fn energy_drift(a: &PendulumState, b: &PendulumState, params: &PendulumParameters) -> f64 {
    let delta = (total_energy(b, params) - total_energy(a, params)).abs();
    let scale = energy_scale(params);
    if scale == 0.0 {
        delta
    } else {
        delta / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::STANDARD_GRAVITY;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn equilibrium_has_zero_derivative() {
        let d = derivatives(&[0.0; 4], &PendulumParameters::default());
        assert_eq!(d, [0.0; 4]);
    }

    #[test]
    fn inverted_equilibrium_has_zero_derivative() {
        let d = derivatives(&[PI, 0.0, PI, 0.0], &PendulumParameters::default());
        for v in d {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn angle_rates_are_the_velocities() {
        let d = derivatives(&[0.3, 1.5, -0.2, -0.7], &PendulumParameters::new(1.2, 0.8, 2.0, 0.5));
        assert_eq!(d[0], 1.5);
        assert_eq!(d[2], -0.7);
    }

    #[test]
    fn horizontal_release_matches_hand_computation() {
        // θ1 = θ2 = π/2, at rest, unit links and masses: δ = 0 so den1 = m1·L1 = 1.
        // ω̇1 = (m2·g·1·1 − 2·g·1) / 1 = −g ; ω̇2 = (2·g·1 − 2·g·1) / 1 = 0.
        let d = derivatives(&[FRAC_PI_2, 0.0, FRAC_PI_2, 0.0], &PendulumParameters::default());
        assert_relative_eq!(d[1], -STANDARD_GRAVITY, epsilon = 1e-12);
        assert_abs_diff_eq!(d[3], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn gravity_is_taken_from_parameters() {
        let params = PendulumParameters::default().with_gravity(1.62);
        let d = derivatives(&[FRAC_PI_2, 0.0, FRAC_PI_2, 0.0], &params);
        assert_relative_eq!(d[1], -1.62, epsilon = 1e-12);
    }

    #[test]
    fn massless_upper_bob_with_aligned_links_is_nan() {
        // m1 = 0 and δ = 0 makes den1 vanish along with the numerator: 0/0.
        let params = PendulumParameters::new(1.0, 1.0, 0.0, 1.0);
        let d = derivatives(&[0.7, 0.0, 0.7, 0.0], &params);
        assert!(d[1].is_nan());
        assert!(d[3].is_nan());
    }

    #[test]
    fn zero_length_gives_non_finite_without_panicking() {
        let params = PendulumParameters::new(0.0, 1.0, 1.0, 1.0);
        let d = derivatives(&[0.4, 0.0, 0.1, 0.0], &params);
        assert!(!d[1].is_finite() || !d[3].is_finite());
    }

    #[test]
    fn den1_bounded_below_by_m1_l1() {
        let params = PendulumParameters::new(1.5, 0.7, 0.3, 4.0);
        for i in 0..64 {
            let delta = i as f64 * PI / 32.0;
            assert!(den1(delta, &params) >= params.m1 * params.l1 - 1e-12);
        }
    }

    #[test]
    fn energy_at_rest_hanging_is_pure_potential() {
        let params = PendulumParameters::default();
        let s = PendulumState::default();
        assert_eq!(kinetic_energy(&s, &params), 0.0);
        // y1 = −1, y2 = −2 ⇒ V = −g − 2g.
        assert_relative_eq!(total_energy(&s, &params), -3.0 * STANDARD_GRAVITY);
    }

    #[test]
    fn kinetic_energy_of_rigid_rotation() {
        // Both links spinning together at ω: bob speeds are ω·L1 and ω·(L1+L2).
        let params = PendulumParameters::new(1.0, 2.0, 3.0, 4.0);
        let s = PendulumState::new(0.2, 1.5, 0.2, 1.5);
        let expected = 0.5 * 3.0 * (1.5_f64 * 1.0).powi(2) + 0.5 * 4.0 * (1.5_f64 * 3.0).powi(2);
        assert_relative_eq!(kinetic_energy(&s, &params), expected, epsilon = 1e-12);
    }

    #[test]
    fn drift_is_normalised_by_hanging_depth() {
        let params = PendulumParameters::default();
        assert_relative_eq!(energy_scale(&params), 3.0 * STANDARD_GRAVITY);
        let hanging = PendulumState::default();
        let horizontal = PendulumState::at_rest(FRAC_PI_2, FRAC_PI_2);
        // Hanging E = −3g, horizontal E ≈ 0.
        assert_relative_eq!(energy_drift(&hanging, &horizontal, &params), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn drift_is_zero_for_identical_states() {
        let params = PendulumParameters::default();
        let s = PendulumState::at_rest(1.0, 2.0);
        assert_eq!(energy_drift(&s, &s, &params), 0.0);
    }
}
