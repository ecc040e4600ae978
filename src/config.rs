//! Server configuration via CLI args and environment variables.

use std::time::Duration;

use clap::Parser;

use streamgate_service::ServiceConfig;

/// Session and admission server for server-push streaming transports.
#[derive(Parser, Debug, Clone)]
#[command(name = "streamgate-server", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "STREAMGATE_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8787, env = "STREAMGATE_PORT")]
    pub port: u16,

    /// CORS allowed origins (comma-separated). Empty for no CORS.
    #[arg(long, env = "STREAMGATE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Maximum concurrent sessions; the oldest is evicted past this.
    #[arg(long, default_value_t = 1000, env = "STREAMGATE_MAX_SESSIONS")]
    pub max_sessions: usize,

    /// Idle session timeout in seconds.
    #[arg(long, default_value_t = 300, env = "STREAMGATE_SESSION_TIMEOUT")]
    pub session_timeout: u64,

    /// Session sweep cadence in seconds.
    #[arg(long, default_value_t = 60, env = "STREAMGATE_CLEANUP_INTERVAL")]
    pub cleanup_interval: u64,

    /// Idle time in seconds before a connection emits a heartbeat frame.
    #[arg(long, default_value_t = 30, env = "STREAMGATE_HEARTBEAT_INTERVAL")]
    pub heartbeat_interval: u64,

    /// Control messages allowed per client per window.
    #[arg(long, default_value_t = 100, env = "STREAMGATE_RATE_LIMIT_REQUESTS")]
    pub rate_limit_requests: u64,

    /// Rate-limit window in seconds.
    #[arg(long, default_value_t = 60, env = "STREAMGATE_RATE_LIMIT_WINDOW")]
    pub rate_limit_window: u64,

    /// Lower bound on the adaptive capacity multiplier.
    #[arg(long, default_value_t = 0.5, env = "STREAMGATE_MIN_MULTIPLIER")]
    pub min_multiplier: f64,

    /// Upper bound on the adaptive capacity multiplier.
    #[arg(long, default_value_t = 2.0, env = "STREAMGATE_MAX_MULTIPLIER")]
    pub max_multiplier: f64,

    /// Log level.
    #[arg(long, default_value = "info", env = "STREAMGATE_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "STREAMGATE_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Extracts the service-layer subset of the configuration.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_sessions: self.max_sessions,
            session_timeout: Duration::from_secs(self.session_timeout),
            cleanup_interval: Duration::from_secs(self.cleanup_interval),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval),
            rate_limit_requests: self.rate_limit_requests,
            rate_limit_window: Duration::from_secs(self.rate_limit_window),
            min_multiplier: self.min_multiplier,
            max_multiplier: self.max_multiplier,
        }
    }
}
