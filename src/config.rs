// src/config.rs
// Server and simulation settings. Every field has a default, so an empty JSON object (or no file at all)
// gives the standard 20 s / 1000-sample setup served on 127.0.0.1:8080.
// Load order: defaults, then the JSON file named by PENDULUM_CONFIG, then PENDULUM_HOST / PENDULUM_PORT.
//
// {
//   "server":     { "host": "0.0.0.0", "port": 9000, "workers": 4 },
//   "simulation": { "t_max": 20.0, "samples": 1000, "gravity": 9.81,
//                   "method": { "kind": "rk4", "substeps": 10 },
//                   "parallel_ensemble": true, "render_width": 500, "render_height": 500 }
// }

use crate::error::{SimError, SimResult};
use crate::logic::Method;
use crate::model::{TimeGrid, DEFAULT_SAMPLES, DEFAULT_T_MAX, STANDARD_GRAVITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "PENDULUM_CONFIG";
pub const HOST_ENV: &str = "PENDULUM_HOST";
pub const PORT_ENV: &str = "PENDULUM_PORT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>, // None = actix default (one per core).
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub t_max: f64,
    pub samples: usize,
    pub gravity: f64,
    pub method: Method,
    pub parallel_ensemble: bool,
    pub render_width: u32,
    pub render_height: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            t_max: DEFAULT_T_MAX,
            samples: DEFAULT_SAMPLES,
            gravity: STANDARD_GRAVITY,
            method: Method::default(),
            parallel_ensemble: true,
            render_width: 500,
            render_height: 500,
        }
    }
}

impl SimulationConfig {
    pub fn grid(&self) -> TimeGrid {
        TimeGrid::new(self.t_max, self.samples)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.t_max.is_finite() && self.t_max > 0.0) {
            return Err(SimError::config(format!("t_max must be positive, got {}", self.t_max)));
        }
        if self.samples < 2 {
            return Err(SimError::config(format!("samples must be at least 2, got {}", self.samples)));
        }
        if !self.gravity.is_finite() {
            return Err(SimError::config("gravity must be finite"));
        }
        if self.render_width == 0 || self.render_height == 0 {
            return Err(SimError::config("render size must be non-zero"));
        }
        match self.method {
            Method::Rk4 { substeps: 0 } => {
                Err(SimError::config("rk4 substeps must be at least 1"))
            }
            Method::Dopri5 {
                rtol,
                atol,
                max_steps,
            } if !(rtol > 0.0 && atol > 0.0 && max_steps > 0) => Err(SimError::config(
                "dopri5 needs positive rtol, atol and max_steps",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| SimError::config(e.to_string()))?;
        config.simulation.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::config(format!("reading {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Loads from the process environment.
    pub fn load() -> SimResult<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads using `lookup` in place of the environment.
    pub fn load_with<F>(lookup: F) -> SimResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(host) = lookup(HOST_ENV) {
            config.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            config.server.port = port
                .trim()
                .parse()
                .map_err(|_| SimError::config(format!("{PORT_ENV} is not a port: {port}")))?;
        }
        config.simulation.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_object_gives_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.simulation.grid(), TimeGrid::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_json_str(
            r#"{"server":{"port":9001},"simulation":{"method":{"kind":"rk4","substeps":20}}}"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.simulation.method, Method::Rk4 { substeps: 20 });
        assert_eq!(config.simulation.samples, 1000);
    }

    #[test]
    fn rejects_degenerate_grid() {
        let err = AppConfig::from_json_str(r#"{"simulation":{"samples":1}}"#).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        let err = AppConfig::from_json_str(r#"{"simulation":{"t_max":-1.0}}"#).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn rejects_zero_substeps() {
        let err = AppConfig::from_json_str(
            r#"{"simulation":{"method":{"kind":"rk4","substeps":0}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("substeps"));
    }

    #[test]
    fn env_overrides_host_and_port() {
        let env: HashMap<&str, &str> = [(HOST_ENV, "0.0.0.0"), (PORT_ENV, "9100")].into();
        let config = AppConfig::load_with(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let err = AppConfig::load_with(|k| (k == PORT_ENV).then(|| "eighty".to_string())).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = AppConfig::load_with(|k| {
            (k == CONFIG_ENV).then(|| "/nonexistent/pendulum.json".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pendulum.json"));
    }
}
