use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root directory for artifacts, side-logs, and metadata.
    pub data_dir: PathBuf,
    /// Upstream API key. Empty means generation calls will be rejected
    /// upstream; the server still starts so the library surface works.
    pub ark_api_key: String,
    /// Upstream base URL override (default: provider production URL).
    pub ark_base_url: Option<String>,
    /// Directory holding the effect processor programs.
    pub processor_dir: PathBuf,
    /// Concurrent effect processor ceiling (default: `2`).
    pub effect_concurrency: usize,
    /// Per-job constant used for queue wait estimates (default: `60`).
    pub avg_processing_secs: u64,
    /// Terminal job retention before eviction (default: `3600`).
    pub job_retention_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `DATA_DIR`             | `data`                     |
    /// | `ARK_API_KEY`          | (empty)                    |
    /// | `ARK_BASE_URL`         | (provider default)         |
    /// | `PROCESSOR_DIR`        | `scripts`                  |
    /// | `EFFECT_CONCURRENCY`   | `2`                        |
    /// | `AVG_PROCESSING_SECS`  | `60`                       |
    /// | `JOB_RETENTION_SECS`   | `3600`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".into()));

        let ark_api_key = std::env::var("ARK_API_KEY").unwrap_or_default();
        let ark_base_url = std::env::var("ARK_BASE_URL").ok();

        let processor_dir =
            PathBuf::from(std::env::var("PROCESSOR_DIR").unwrap_or_else(|_| "scripts".into()));

        let effect_concurrency: usize = std::env::var("EFFECT_CONCURRENCY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("EFFECT_CONCURRENCY must be a valid usize");

        let avg_processing_secs: u64 = std::env::var("AVG_PROCESSING_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("AVG_PROCESSING_SECS must be a valid u64");

        let job_retention_secs: u64 = std::env::var("JOB_RETENTION_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("JOB_RETENTION_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            ark_api_key,
            ark_base_url,
            processor_dir,
            effect_concurrency,
            avg_processing_secs,
            job_retention_secs,
        }
    }
}
