//! API configuration.

use std::path::PathBuf;
use std::str::FromStr;

use unmark_media::PipelineConfig;

/// Largest accepted upload (2 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Max JSON request body size
    pub max_body_size: usize,
    /// Max size of an uploaded video file
    pub max_upload_bytes: u64,
    /// Root holding `uploads/`, `frames/` and `processed/`
    pub storage_dir: PathBuf,
    /// Per FFmpeg invocation; unset waits indefinitely
    pub encode_timeout_secs: Option<u64>,
    /// Environment (development/production)
    pub environment: String,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 20,
            max_body_size: 1024 * 1024,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            storage_dir: PathBuf::from("./data"),
            encode_timeout_secs: None,
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_or("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| parse_list(&s))
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_or("RATE_LIMIT_RPS", defaults.rate_limit_rps),
            max_body_size: env_or("MAX_BODY_SIZE", defaults.max_body_size),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            storage_dir: std::env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            encode_timeout_secs: std::env::var("ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .filter(|secs| *secs > 0),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Pipeline settings derived from this config.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            encode_timeout_secs: self.encode_timeout_secs,
            ..PipelineConfig::default()
        }
    }

    /// Upload limit as a body size for axum and tower-http.
    pub fn upload_body_limit(&self) -> usize {
        // Room for multipart boundaries and headers around the file
        const MULTIPART_OVERHEAD: u64 = 1024 * 1024;
        usize::try_from(self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 5001);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.encode_timeout_secs, None);
        assert!(!config.is_production());
        assert!(config.upload_body_limit() as u64 > config.max_upload_bytes);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("http://localhost:3000, https://unmark.app,"),
            vec!["http://localhost:3000", "https://unmark.app"]
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("off"));
    }

    #[test]
    fn test_pipeline_config_carries_timeout() {
        let config = ApiConfig {
            encode_timeout_secs: Some(600),
            environment: "Production".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(config.pipeline_config().encode_timeout_secs, Some(600));
        assert_eq!(config.pipeline_config().progress_interval, 30);
        assert!(config.is_production());
    }
}
