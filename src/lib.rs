// src/lib.rs
// Double-pendulum simulator.
// Data flow: parameters -> derivative (math) -> integrator (logic) -> angular trajectory
// -> kinematic projection (kinematics) -> Cartesian frames -> HTTP response / preview image (ui, render).
// Ensemble mode (ensemble) fans one base pendulum out into N swept variants and integrates them independently.

pub mod config;
pub mod ensemble;
pub mod error;
pub mod kinematics;
pub mod logic;
pub mod math;
pub mod model;
pub mod render;
pub mod request;
pub mod ui;

pub use ensemble::{run_ensemble, EnsembleRun, EnsembleSpec, MemberRun};
pub use error::{SimError, SimResult};
pub use logic::{integrate, CancelToken, DoublePendulumSolver, Method};
pub use model::{
    CartesianFrame, IntegrationStatus, OffsetTarget, PendulumParameters, PendulumState, TimeGrid,
    Trajectory,
};
