// src/kinematics.rs
// Angular state -> Cartesian bob positions, origin at the fixed pivot, hanging toward -y at θ = 0.
// Stateless and tolerant of non-finite input: NaN angles simply give NaN coordinates.

use crate::model::{CartesianFrame, PendulumParameters, PendulumState, Trajectory};

/// Projects one state onto bob positions.
pub fn project(state: &PendulumState, params: &PendulumParameters) -> CartesianFrame {
    project_with_offset(state, params, 0.0)
}

/// Projects one state, shifting both bobs horizontally by `x_offset`.
/// The shift is purely visual (used to separate overlapping ensemble members) and has no physical meaning.
pub fn project_with_offset(
    state: &PendulumState,
    params: &PendulumParameters,
    x_offset: f64,
) -> CartesianFrame {
    let (s1, c1) = state.theta1.sin_cos();
    let (s2, c2) = state.theta2.sin_cos();
    let x1 = params.l1 * s1;
    let y1 = -params.l1 * c1;
    let x2 = x1 + params.l2 * s2;
    let y2 = y1 - params.l2 * c2;
    CartesianFrame {
        x1: x1 + x_offset,
        y1,
        x2: x2 + x_offset,
        y2,
    }
}

/// Frame sequence for a whole trajectory, indexed like the trajectory itself.
pub fn frames(trajectory: &Trajectory, params: &PendulumParameters) -> Vec<CartesianFrame> {
    frames_with_offset(trajectory, params, 0.0)
}

pub fn frames_with_offset(
    trajectory: &Trajectory,
    params: &PendulumParameters,
    x_offset: f64,
) -> Vec<CartesianFrame> {
    trajectory
        .iter()
        .map(|s| project_with_offset(s, params, x_offset))
        .collect()
}

/// Recovers `(θ1, θ2)` in `(-π, π]` from an un-shifted frame.
pub fn recover_angles(frame: &CartesianFrame) -> (f64, f64) {
    let theta1 = frame.x1.atan2(-frame.y1);
    let theta2 = (frame.x2 - frame.x1).atan2(-(frame.y2 - frame.y1));
    (theta1, theta2)
}

/// Path of the lower bob, skipping non-finite frames.
pub fn trace(frames: &[CartesianFrame]) -> Vec<(f64, f64)> {
    frames
        .iter()
        .filter(|f| f.x2.is_finite() && f.y2.is_finite())
        .map(CartesianFrame::bob2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    fn wrapped_diff(a: f64, b: f64) -> f64 {
        ((a - b + PI).rem_euclid(TAU) - PI).abs()
    }

    #[test]
    fn hanging_at_rest() {
        let f = project(&PendulumState::default(), &PendulumParameters::new(1.5, 0.5, 1.0, 1.0));
        assert_abs_diff_eq!(f.x1, 0.0);
        assert_abs_diff_eq!(f.y1, -1.5);
        assert_abs_diff_eq!(f.x2, 0.0);
        assert_abs_diff_eq!(f.y2, -2.0);
    }

    #[test]
    fn horizontal_links() {
        let f = project(
            &PendulumState::at_rest(FRAC_PI_2, -FRAC_PI_2),
            &PendulumParameters::new(2.0, 1.0, 1.0, 1.0),
        );
        assert_abs_diff_eq!(f.x1, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.y1, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.x2, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.y2, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn recover_angles_round_trip() {
        let lengths = [(1.0, 1.0), (0.1, 5.0), (3.3, 0.7)];
        for (l1, l2) in lengths {
            let params = PendulumParameters::new(l1, l2, 1.0, 1.0);
            for i in -12..=12 {
                for j in -12..=12 {
                    let theta1 = i as f64 * 0.61;
                    let theta2 = j as f64 * 0.37 + 0.05;
                    let f = project(&PendulumState::at_rest(theta1, theta2), &params);
                    let (r1, r2) = recover_angles(&f);
                    assert!(wrapped_diff(r1, theta1) < 1e-9, "θ1 {theta1} -> {r1}");
                    assert!(wrapped_diff(r2, theta2) < 1e-9, "θ2 {theta2} -> {r2}");
                }
            }
        }
    }

    #[test]
    fn offset_shifts_only_x() {
        let params = PendulumParameters::default();
        let s = PendulumState::at_rest(0.4, 1.1);
        let a = project(&s, &params);
        let b = project_with_offset(&s, &params, 0.75);
        assert_abs_diff_eq!(b.x1 - a.x1, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(b.x2 - a.x2, 0.75, epsilon = 1e-12);
        assert_eq!(a.y1, b.y1);
        assert_eq!(a.y2, b.y2);
    }

    #[test]
    fn nan_state_projects_to_nan_and_is_dropped_from_trace() {
        let params = PendulumParameters::default();
        let good = project(&PendulumState::at_rest(0.2, 0.3), &params);
        let bad = project(&PendulumState::nan(), &params);
        assert!(!bad.is_finite());
        let path = trace(&[good, bad, good]);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], good.bob2());
    }
}
