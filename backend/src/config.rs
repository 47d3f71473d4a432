//! Runtime settings read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer (value: {value:?})")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    pub static_dir: PathBuf,
    /// Pause before a form result is rendered. Zero disables it.
    pub analysis_delay: Duration,
    pub rate_limit_per_minute: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable source. Unset variables
    /// take their defaults; set but malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = non_empty("HOST", lookup("HOST"))?.unwrap_or_else(|| "127.0.0.1".to_string());
        let port = number("PORT", lookup("PORT"))?.unwrap_or(8080);
        let workers = number("WORKERS", lookup("WORKERS"))?.unwrap_or_else(num_cpus::get);
        let model_path = non_empty("MODEL_PATH", lookup("MODEL_PATH"))?
            .unwrap_or_else(|| "diabetes_model.json".to_string());
        let static_dir = non_empty("STATIC_DIR", lookup("STATIC_DIR"))?
            .unwrap_or_else(|| "./static".to_string());
        let delay_ms: u64 = number("ANALYSIS_DELAY_MS", lookup("ANALYSIS_DELAY_MS"))?.unwrap_or(0);
        let rate_limit_per_minute =
            number("RATE_LIMIT_PER_MINUTE", lookup("RATE_LIMIT_PER_MINUTE"))?.unwrap_or(100);

        Ok(Settings {
            host,
            port,
            workers: workers.max(1),
            model_path: PathBuf::from(model_path),
            static_dir: PathBuf::from(static_dir),
            analysis_delay: Duration::from_millis(delay_ms),
            rate_limit_per_minute,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origins allowed by CORS: the served address, plus the loopback
    /// names when bound to a loopback or wildcard host.
    pub fn allowed_origins(&self) -> Vec<String> {
        match self.host.as_str() {
            "127.0.0.1" | "localhost" | "0.0.0.0" => vec![
                format!("http://localhost:{}", self.port),
                format!("http://127.0.0.1:{}", self.port),
            ],
            host => vec![format!("http://{}:{}", host, self.port)],
        }
    }
}

fn non_empty(name: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Empty { name }),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

fn number<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value: v }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 8080);
        assert!(s.workers >= 1);
        assert_eq!(s.model_path, PathBuf::from("diabetes_model.json"));
        assert_eq!(s.static_dir, PathBuf::from("./static"));
        assert_eq!(s.analysis_delay, Duration::ZERO);
        assert_eq!(s.rate_limit_per_minute, 100);
        assert_eq!(s.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn overrides_are_applied() {
        let s = settings(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("WORKERS", "3"),
            ("MODEL_PATH", "/srv/models/lr.onnx"),
            ("ANALYSIS_DELAY_MS", "1000"),
            ("RATE_LIMIT_PER_MINUTE", "5"),
        ])
        .unwrap();
        assert_eq!(s.bind_address(), "0.0.0.0:9000");
        assert_eq!(s.workers, 3);
        assert_eq!(s.model_path, PathBuf::from("/srv/models/lr.onnx"));
        assert_eq!(s.analysis_delay, Duration::from_secs(1));
        assert_eq!(s.rate_limit_per_minute, 5);
    }

    #[test]
    fn origins_follow_host_and_port() {
        let s = settings(&[]).unwrap();
        assert_eq!(
            s.allowed_origins(),
            vec!["http://localhost:8080", "http://127.0.0.1:8080"]
        );

        let s = settings(&[("HOST", "risk.internal"), ("PORT", "9000")]).unwrap();
        assert_eq!(s.allowed_origins(), vec!["http://risk.internal:9000"]);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert_eq!(
            settings(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidNumber { name: "PORT", value: "eighty".into() })
        );
        assert!(matches!(
            settings(&[("ANALYSIS_DELAY_MS", "-1")]),
            Err(ConfigError::InvalidNumber { name: "ANALYSIS_DELAY_MS", .. })
        ));
    }

    #[test]
    fn blank_model_path_is_rejected() {
        assert_eq!(
            settings(&[("MODEL_PATH", "  ")]),
            Err(ConfigError::Empty { name: "MODEL_PATH" })
        );
    }
}
