// src/ui.rs
// HTTP surface: a client posts a parameter record and gets back the full frame sequence plus a preview image.
// All integration is finished before the response is built, so a client can play frames back at any cadence.
// The CPU-bound work runs on tokio's blocking pool so actix workers stay responsive.

use crate::config::SimulationConfig;
use crate::ensemble::run_ensemble;
use crate::error::{SimError, SimResult};
use crate::kinematics;
use crate::logic::DoublePendulumSolver;
use crate::math;
use crate::model::{CartesianFrame, IntegrationStatus, OffsetTarget};
use crate::render;
use crate::request::{EnsembleRequest, SimulationRequest};
use actix_web::{web, HttpResponse};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct SimResponse {
    pub success: bool,
    pub status: IntegrationStatus,
    pub energy_drift: Option<f64>, // Relative drift of total energy at the last sample; None once non-finite.
    pub times: Vec<f64>,
    pub frames: Vec<CartesianFrame>, // Non-finite coordinates serialize as null.
    pub limit: f64,                  // Plot half-extent for consistent scaling.
    pub trajectory_image: String,    // PNG data URL.
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub index: usize,
    pub offset: f64, // In request units (degrees for angle targets).
    pub status: IntegrationStatus,
    pub frames: Vec<CartesianFrame>,
}

#[derive(Debug, Serialize)]
pub struct EnsembleResponse {
    pub success: bool,
    pub target: OffsetTarget,
    pub amount: f64,
    pub times: Vec<f64>,
    pub members: Vec<MemberResponse>,
    pub limit: f64,
    pub trajectory_image: String,
}

/// Integrates and projects a single pendulum.
pub fn simulate(request: &SimulationRequest, config: &SimulationConfig) -> SimResult<SimResponse> {
    request.validate()?;
    let params = request.params(config.gravity);
    let grid = config.grid();

    let trajectory = DoublePendulumSolver::new(params, config.method).solve(request.initial_state(), &grid);
    let frames = kinematics::frames(&trajectory, &params);

    let energy_drift = match (trajectory.first(), trajectory.last()) {
        (Some(first), Some(last)) => Some(math::energy_drift(first, last, &params)),
        _ => None,
    }
    .filter(|d| d.is_finite());

    let limit = render::axis_limit([params.total_length()]);
    let png = render::trace_png(
        &[kinematics::trace(&frames)],
        limit,
        config.render_width,
        config.render_height,
    )?;

    info!(
        method = config.method.name(),
        samples = grid.len(),
        status = ?trajectory.status(),
        nfev = trajectory.stats().nfev,
        "simulation served"
    );

    Ok(SimResponse {
        success: true,
        status: trajectory.status(),
        energy_drift,
        times: grid.times(),
        frames,
        limit,
        trajectory_image: render::to_data_url(&png),
    })
}

/// Integrates every member of an ensemble and projects each one.
pub fn simulate_ensemble(
    request: &EnsembleRequest,
    config: &SimulationConfig,
) -> SimResult<EnsembleResponse> {
    request.validate()?;
    let spec = request.spec(config.gravity);
    let grid = config.grid();
    let run = run_ensemble(&spec, &grid, &config.method, config.parallel_ensemble);

    let members: Vec<MemberResponse> = run
        .runs
        .iter()
        .map(|r| MemberResponse {
            index: r.member.index,
            offset: if spec.target.is_angle() {
                r.member.offset.to_degrees()
            } else {
                r.member.offset
            },
            status: r.trajectory.status(),
            frames: r.frames_spaced(request.x_spacing),
        })
        .collect();

    let spread = request.x_spacing.abs() * spec.size.saturating_sub(1) as f64;
    let limit = render::axis_limit(run.runs.iter().map(|r| r.member.params.total_length())) + spread;
    let traces: Vec<Vec<(f64, f64)>> = members.iter().map(|m| kinematics::trace(&m.frames)).collect();
    let png = render::trace_png(&traces, limit, config.render_width, config.render_height)?;

    Ok(EnsembleResponse {
        success: true,
        target: request.offset_target,
        amount: request.offset_amount,
        times: grid.times(),
        members,
        limit,
        trajectory_image: render::to_data_url(&png),
    })
}

async fn run_blocking<T, F>(job: F) -> SimResult<T>
where
    F: FnOnce() -> SimResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| SimError::internal(e.to_string()))?
}

pub async fn simulate_handler(
    config: web::Data<SimulationConfig>,
    params: web::Json<SimulationRequest>,
) -> Result<HttpResponse, SimError> {
    let request = params.into_inner();
    request.validate()?; // Reject before touching the blocking pool.
    let config = *config.get_ref();
    let response = run_blocking(move || simulate(&request, &config)).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn ensemble_handler(
    config: web::Data<SimulationConfig>,
    params: web::Json<EnsembleRequest>,
) -> Result<HttpResponse, SimError> {
    let request = params.into_inner();
    request.validate()?;
    let config = *config.get_ref();
    let response = run_blocking(move || simulate_ensemble(&request, &config)).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health_handler))
            .route("/simulate", web::post().to(simulate_handler))
            .route("/ensemble", web::post().to(ensemble_handler)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn short_config() -> SimulationConfig {
        SimulationConfig {
            t_max: 2.0,
            samples: 101,
            render_width: 96,
            render_height: 96,
            ..SimulationConfig::default()
        }
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }

    #[actix_web::test]
    async fn simulate_returns_one_frame_per_sample() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(short_config()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/simulate")
            .set_json(json!({
                "theta1_deg": 90.0, "theta2_deg": 90.0,
                "l1": 1.0, "l2": 1.0, "m1": 1.0, "m2": 1.0
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["status"]["kind"], "completed");
        assert_eq!(body["frames"].as_array().map(Vec::len), Some(101));
        assert_eq!(body["times"].as_array().map(Vec::len), Some(101));
        assert!(body["frames"][0]["x1"]
            .as_f64()
            .is_some_and(|x| (x - 1.0).abs() < 1e-12));
        assert!(body["energy_drift"].as_f64().is_some_and(|d| d < 1e-6));
        assert!(body["trajectory_image"]
            .as_str()
            .is_some_and(|s| s.starts_with("data:image/png;base64,")));
    }

    #[actix_web::test]
    async fn simulate_rejects_out_of_range_mass() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(short_config()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/simulate")
            .set_json(json!({
                "theta1_deg": 10.0, "theta2_deg": 10.0,
                "l1": 1.0, "l2": 1.0, "m1": 9.0, "m2": 1.0
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some_and(|e| e.contains("m1")));
    }

    #[actix_web::test]
    async fn ensemble_returns_members_in_order() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(short_config()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/ensemble")
            .set_json(json!({
                "theta1_deg": 120.0, "theta2_deg": 120.0,
                "l1": 1.0, "l2": 1.0, "m1": 1.0, "m2": 1.0,
                "offset_target": "theta2", "offset_amount": 2.0,
                "ensemble_size": 5
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let members = body["members"].as_array().cloned().unwrap_or_default();
        assert_eq!(members.len(), 5);
        for (k, m) in members.iter().enumerate() {
            assert_eq!(m["index"].as_u64(), Some(k as u64));
            assert_eq!(m["frames"].as_array().map(Vec::len), Some(101));
        }
        assert_eq!(members[0]["offset"].as_f64(), Some(0.0));
        let last = members[4]["offset"].as_f64().unwrap_or_default();
        assert!((last - 2.0).abs() < 1e-12);
    }

    #[actix_web::test]
    async fn ensemble_limit_accounts_for_spacing() {
        let request = EnsembleRequest {
            base: SimulationRequest {
                theta1_deg: 30.0,
                theta2_deg: 30.0,
                l1: 1.0,
                l2: 1.0,
                m1: 1.0,
                m2: 1.0,
                omega1: 0.0,
                omega2: 0.0,
            },
            offset_target: OffsetTarget::L2,
            offset_amount: 1.0,
            ensemble_size: 3,
            x_spacing: 0.5,
        };
        let config = SimulationConfig {
            t_max: 0.5,
            samples: 11,
            render_width: 32,
            render_height: 32,
            ..SimulationConfig::default()
        };
        let response = simulate_ensemble(&request, &config).unwrap();
        // Longest reach is 1 + 2 = 3, plus margin 0.5, plus two spacings of 0.5.
        assert!((response.limit - 4.5).abs() < 1e-12);
        assert!((response.members[2].frames[0].x1 - (30.0_f64.to_radians().sin() + 1.0)).abs() < 1e-12);
    }
}
