// src/main.rs
// Server entry point: load configuration, install logging, serve the simulation API.

use actix_web::{middleware, web, App, HttpServer};
use double_pendulum_sim::config::AppConfig;
use double_pendulum_sim::error::SimError;
use double_pendulum_sim::ui;
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().map_err(io::Error::other)?;
    let simulation = web::Data::new(config.simulation);
    info!(
        host = %config.server.host,
        port = config.server.port,
        method = config.simulation.method.name(),
        t_max = config.simulation.t_max,
        samples = config.simulation.samples,
        "starting double pendulum server"
    );

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(simulation.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                SimError::invalid_request(err.to_string()).into()
            }))
            .configure(ui::configure)
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }
    server
        .bind((config.server.host.as_str(), config.server.port))?
        .run()
        .await
}
