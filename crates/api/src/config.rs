use std::time::Duration;

use meridian_notify::dispatch::DispatchPolicy;
use meridian_notify::sender::SenderConfig;

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
    /// Shared secret for webhook signature verification. When unset,
    /// webhook signatures are not checked (local development).
    pub webhook_secret: Option<String>,
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
    /// | `WEBHOOK_SECRET`       | unset (verification off)   |
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

        let webhook_secret = std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            webhook_secret,
        }
    }
}

/// Notification engine tuning loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-send transport timeout in seconds (default: `30`).
    pub transport_timeout_secs: u64,
    /// Attempt cap stamped onto new log rows (default: `3`).
    pub max_attempts: i32,
    /// Campaigns with more recipients than this run on the queue
    /// (default: `50`).
    pub campaign_queue_threshold: usize,
    /// Bulk sends up to this size run inline (default: `10`).
    pub bulk_inline_limit: usize,
    /// Scheduler poll interval in seconds (default: `60`).
    pub scheduler_poll_secs: u64,
    /// Log retention sweep interval in seconds (default: `3600`).
    pub retention_sweep_secs: u64,
    /// Logs older than this many days are archived (default: `180`).
    pub log_retention_days: i64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `TRANSPORT_TIMEOUT_SECS`   | `30`    |
    /// | `MAX_SEND_ATTEMPTS`        | `3`     |
    /// | `CAMPAIGN_QUEUE_THRESHOLD` | `50`    |
    /// | `BULK_INLINE_LIMIT`        | `10`    |
    /// | `SCHEDULER_POLL_SECS`      | `60`    |
    /// | `RETENTION_SWEEP_SECS`     | `3600`  |
    /// | `LOG_RETENTION_DAYS`       | `180`   |
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(var: &str, default: T) -> T {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            transport_timeout_secs: parsed("TRANSPORT_TIMEOUT_SECS", 30),
            max_attempts: parsed("MAX_SEND_ATTEMPTS", 3),
            campaign_queue_threshold: parsed("CAMPAIGN_QUEUE_THRESHOLD", 50),
            bulk_inline_limit: parsed("BULK_INLINE_LIMIT", 10),
            scheduler_poll_secs: parsed("SCHEDULER_POLL_SECS", 60),
            retention_sweep_secs: parsed("RETENTION_SWEEP_SECS", 3600),
            log_retention_days: parsed("LOG_RETENTION_DAYS", 180),
        }
    }

    /// Sender settings derived from this configuration.
    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            transport_timeout: Duration::from_secs(self.transport_timeout_secs),
            default_max_attempts: self.max_attempts,
        }
    }

    /// Dispatch policy derived from this configuration.
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            campaign_queue_threshold: self.campaign_queue_threshold,
            bulk_inline_limit: self.bulk_inline_limit,
        }
    }
}
