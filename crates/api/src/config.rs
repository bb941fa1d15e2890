use curio_core::engine::{EngineConfig, DEFAULT_CALCULATE_WORKERS};

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
    /// Base URL of the catalog service.
    pub catalog_api_url: String,
    /// Bulk modification engine settings.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `CATALOG_API_URL`        | `http://localhost:5000`    |
    /// | `BULK_CALCULATE_WORKERS` | `4`                        |
    /// | `BULK_STRICT_PREVIEW`    | `false`                    |
    ///
    /// `DATABASE_URL` is read separately by the binary.
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

        let catalog_api_url =
            std::env::var("CATALOG_API_URL").unwrap_or_else(|_| "http://localhost:5000".into());

        let calculate_workers: usize = std::env::var("BULK_CALCULATE_WORKERS")
            .unwrap_or_else(|_| DEFAULT_CALCULATE_WORKERS.to_string())
            .parse()
            .expect("BULK_CALCULATE_WORKERS must be a valid usize");

        let strict_preview: bool = std::env::var("BULK_STRICT_PREVIEW")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("BULK_STRICT_PREVIEW must be true or false");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            catalog_api_url,
            engine: EngineConfig {
                calculate_workers: calculate_workers.max(1),
                strict_preview,
            },
        }
    }
}
