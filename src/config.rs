//! Service configuration — environment variables, CLI overrides, defaults.

use tracing::warn;

/// Runtime configuration shared by the API server and the worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Bind address (e.g., "0.0.0.0:8000")
    pub bind_address: String,
    /// Shared-secret API key for `X-API-Key`; empty disables auth
    pub api_key: String,
    /// Maximum upload payload size in MiB (default: 40)
    pub max_body_mb: usize,
    /// Job-queue connection URL (defaults to `database_url`)
    pub broker_url: String,
    /// Worker queue poll interval in seconds (default: 2)
    pub worker_poll_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            bind_address: "0.0.0.0:8000".to_string(),
            api_key: String::new(),
            max_body_mb: 40,
            broker_url: String::new(),
            worker_poll_secs: 2,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with CLI overrides.
    ///
    /// `DATABASE_URL` is the only hard requirement; the binaries refuse to
    /// start without it. An empty `API_KEY` disables upload authentication,
    /// which is only sensible for local development.
    pub fn from_env(
        database_url: Option<String>,
        bind_address: Option<String>,
        port: Option<u16>,
    ) -> anyhow::Result<Self> {
        let mut config = Self::default();

        // Database URL: CLI arg > env var
        config.database_url = database_url
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_default();

        // Bind address: CLI --bind-address or --port
        if let Some(addr) = bind_address {
            config.bind_address = addr;
        } else if let Some(p) = port {
            config.bind_address = format!("0.0.0.0:{p}");
        }

        config.api_key = std::env::var("API_KEY").unwrap_or_default();
        if config.api_key.is_empty() {
            warn!("API_KEY not set — upload authentication is disabled");
        }

        if let Ok(v) = std::env::var("MAX_BODY_MB") {
            if let Ok(n) = v.parse() {
                config.max_body_mb = n;
            }
        }

        // The job queue lives in Postgres; BROKER_URL exists so deployments
        // can point workers at a dedicated replica. RESULT_BACKEND is
        // accepted for deploy-script compatibility and ignored.
        config.broker_url = std::env::var("BROKER_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| config.database_url.clone());
        let _ = std::env::var("RESULT_BACKEND");

        if let Ok(v) = std::env::var("WORKER_POLL_SECS") {
            if let Ok(n) = v.parse() {
                config.worker_poll_secs = n;
            }
        }

        Ok(config)
    }

    /// Upload size cap in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb * 1024 * 1024
    }
}
