// src/request.rs
// Parameter records as supplied by an interactive client, before they enter the core.
// Ranges mirror the client's controls: angles 0..=360 degrees, lengths and masses 0.1..=5,
// ensemble offsets -10..=10 with 1..=20 members. Degrees become radians here and nowhere else.
// For angle targets the ensemble offset is also given in degrees, matching the angle inputs.

use crate::ensemble::{EnsembleSpec, MAX_ENSEMBLE_SIZE};
use crate::error::{SimError, SimResult};
use crate::model::{OffsetTarget, PendulumParameters, PendulumState};
use serde::Deserialize;
use std::ops::RangeInclusive;

const ANGLE_DEG: RangeInclusive<f64> = 0.0..=360.0;
const LINK: RangeInclusive<f64> = 0.1..=5.0;
const OFFSET: RangeInclusive<f64> = -10.0..=10.0;

/// One pendulum's initial conditions and physical constants.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SimulationRequest {
    pub theta1_deg: f64,
    pub theta2_deg: f64,
    pub l1: f64,
    pub l2: f64,
    pub m1: f64,
    pub m2: f64,
    #[serde(default)]
    pub omega1: f64, // rad/s
    #[serde(default)]
    pub omega2: f64, // rad/s
}

fn check(name: &str, value: f64, range: &RangeInclusive<f64>) -> SimResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SimError::invalid_request(format!(
            "{name} = {value} outside [{}, {}]",
            range.start(),
            range.end()
        )))
    }
}

impl SimulationRequest {
    pub fn validate(&self) -> SimResult<()> {
        check("theta1_deg", self.theta1_deg, &ANGLE_DEG)?;
        check("theta2_deg", self.theta2_deg, &ANGLE_DEG)?;
        check("l1", self.l1, &LINK)?;
        check("l2", self.l2, &LINK)?;
        check("m1", self.m1, &LINK)?;
        check("m2", self.m2, &LINK)?;
        if !(self.omega1.is_finite() && self.omega2.is_finite()) {
            return Err(SimError::invalid_request("initial angular velocities must be finite"));
        }
        Ok(())
    }

    pub fn params(&self, gravity: f64) -> PendulumParameters {
        PendulumParameters::new(self.l1, self.l2, self.m1, self.m2).with_gravity(gravity)
    }

    pub fn initial_state(&self) -> PendulumState {
        PendulumState::new(
            self.theta1_deg.to_radians(),
            self.omega1,
            self.theta2_deg.to_radians(),
            self.omega2,
        )
    }
}

/// A base pendulum plus the sweep that turns it into an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EnsembleRequest {
    #[serde(flatten)]
    pub base: SimulationRequest,
    pub offset_target: OffsetTarget,
    pub offset_amount: f64,
    pub ensemble_size: usize,
    /// Horizontal spacing between member pivots in the returned frames (display only).
    #[serde(default)]
    pub x_spacing: f64,
}

impl EnsembleRequest {
    pub fn validate(&self) -> SimResult<()> {
        self.base.validate()?;
        check("offset_amount", self.offset_amount, &OFFSET)?;
        if !(1..=MAX_ENSEMBLE_SIZE).contains(&self.ensemble_size) {
            return Err(SimError::invalid_request(format!(
                "ensemble_size = {} outside [1, {MAX_ENSEMBLE_SIZE}]",
                self.ensemble_size
            )));
        }
        if !self.x_spacing.is_finite() {
            return Err(SimError::invalid_request("x_spacing must be finite"));
        }
        Ok(())
    }

    /// Offset in core units: radians for angle targets, unchanged otherwise.
    pub fn core_offset(&self) -> f64 {
        if self.offset_target.is_angle() {
            self.offset_amount.to_radians()
        } else {
            self.offset_amount
        }
    }

    pub fn spec(&self, gravity: f64) -> EnsembleSpec {
        EnsembleSpec::new(
            self.base.params(gravity),
            self.base.initial_state(),
            self.offset_target,
            self.core_offset(),
            self.ensemble_size,
        )
    }
}
