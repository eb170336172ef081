// src/ensemble.rs
// Multi-pendulum mode: N near-identical pendulums that differ only in one swept field.
// Member k gets offset k/(N-1) * amount (member 0 is the unperturbed base, member N-1 the fully
// perturbed one). Members share no state, so they are integrated independently. With rayon they run in
// parallel, and the indexed collect keeps results in member order whatever order they finish in.
// A member that goes non-finite is reported through its trajectory status and never stops its siblings.

use crate::kinematics;
use crate::logic::{CancelToken, DoublePendulumSolver, Method};
use crate::model::{
    CartesianFrame, OffsetTarget, PendulumParameters, PendulumState, TimeGrid, Trajectory,
};
use rayon::prelude::*;
use tracing::{info, warn};

/// Largest ensemble the service surface accepts.
pub const MAX_ENSEMBLE_SIZE: usize = 20;

/// Base configuration plus the sweep applied across the ensemble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleSpec {
    pub base_params: PendulumParameters,
    pub base_state: PendulumState,
    pub target: OffsetTarget,
    /// Full offset applied to the last member, in the target field's own units (radians for angles).
    pub amount: f64,
    pub size: usize,
}

/// One fully-resolved ensemble member, ready to integrate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleMember {
    pub index: usize,
    pub offset: f64,
    pub params: PendulumParameters,
    pub initial: PendulumState,
}

impl EnsembleSpec {
    pub fn new(
        base_params: PendulumParameters,
        base_state: PendulumState,
        target: OffsetTarget,
        amount: f64,
        size: usize,
    ) -> Self {
        Self {
            base_params,
            base_state,
            target,
            amount,
            size,
        }
    }

    /// Offset for member `k`: linear from 0 to `amount`. A single-member ensemble is unperturbed.
    pub fn offset(&self, k: usize) -> f64 {
        if self.size <= 1 {
            0.0
        } else if k + 1 == self.size {
            self.amount
        } else {
            k as f64 / (self.size - 1) as f64 * self.amount
        }
    }

    pub fn offsets(&self) -> Vec<f64> {
        (0..self.size).map(|k| self.offset(k)).collect()
    }

    pub fn member(&self, k: usize) -> EnsembleMember {
        let offset = self.offset(k);
        let (params, initial) = self.target.apply(self.base_params, self.base_state, offset);
        EnsembleMember {
            index: k,
            offset,
            params,
            initial,
        }
    }

    pub fn members(&self) -> Vec<EnsembleMember> {
        (0..self.size).map(|k| self.member(k)).collect()
    }
}

impl EnsembleMember {
    pub fn integrate(
        &self,
        grid: &TimeGrid,
        method: &Method,
        cancel: Option<&CancelToken>,
    ) -> Trajectory {
        DoublePendulumSolver::new(self.params, *method).solve_with_cancel(self.initial, grid, cancel)
    }
}

/// A member together with its integrated trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRun {
    pub member: EnsembleMember,
    pub trajectory: Trajectory,
}

impl MemberRun {
    pub fn frames(&self) -> Vec<CartesianFrame> {
        kinematics::frames(&self.trajectory, &self.member.params)
    }

    /// Frames shifted right by `index * spacing`, for side-by-side display.
    pub fn frames_spaced(&self, spacing: f64) -> Vec<CartesianFrame> {
        kinematics::frames_with_offset(
            &self.trajectory,
            &self.member.params,
            self.member.index as f64 * spacing,
        )
    }
}

/// All N member runs, indexed by member.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleRun {
    pub runs: Vec<MemberRun>,
}

impl EnsembleRun {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn get(&self, k: usize) -> Option<&MemberRun> {
        self.runs.get(k)
    }

    /// Members whose trajectory contains any NaN/∞ sample.
    pub fn degenerate_members(&self) -> Vec<usize> {
        self.runs
            .iter()
            .filter(|r| !r.trajectory.is_finite())
            .map(|r| r.member.index)
            .collect()
    }
}

/// Integrates every member of `spec`. `parallel` spreads members across the rayon pool.
pub fn run_ensemble(
    spec: &EnsembleSpec,
    grid: &TimeGrid,
    method: &Method,
    parallel: bool,
) -> EnsembleRun {
    run_ensemble_with_cancel(spec, grid, method, parallel, None)
}

pub fn run_ensemble_with_cancel(
    spec: &EnsembleSpec,
    grid: &TimeGrid,
    method: &Method,
    parallel: bool,
    cancel: Option<&CancelToken>,
) -> EnsembleRun {
    let members = spec.members();
    let integrate_one = |member: EnsembleMember| MemberRun {
        trajectory: member.integrate(grid, method, cancel),
        member,
    };
    let runs: Vec<MemberRun> = if parallel {
        members.into_par_iter().map(integrate_one).collect()
    } else {
        members.into_iter().map(integrate_one).collect()
    };

    let run = EnsembleRun { runs };
    let degenerate = run.degenerate_members();
    info!(
        members = run.len(),
        offset_target = %spec.target,
        amount = spec.amount,
        method = method.name(),
        parallel,
        degenerate = degenerate.len(),
        "ensemble integrated"
    );
    if !degenerate.is_empty() {
        warn!(members = ?degenerate, "ensemble members went non-finite");
    }
    run
}
