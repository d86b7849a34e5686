use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// Process-level configuration for the service binary.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Inbound listener settings
    pub listen_addr: String,
    pub ready_path: String,
    pub live_path: String,
    pub metrics_path: String,
    pub shutdown_timeout_secs: u64,
    pub upstream_url: Option<String>,
    pub debug: bool,

    // Outbound client settings
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            ready_path: "/ready".to_string(),
            live_path: "/live".to_string(),
            metrics_path: "/debug/vars".to_string(),
            shutdown_timeout_secs: 30,
            upstream_url: None,
            debug: false,
            client: ClientConfig::default(),
        }
    }
}

impl Config {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Outbound HTTP client settings.
///
/// Every option has exactly one default, enumerated in `Default`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub idle_conn_timeout_secs: u64,
    pub max_idle_conns_per_host: usize,
    /// Recorded for parity with other stacks; reqwest has no per-host cap.
    pub max_conns_per_host: usize,
    pub disable_compression: bool,
    /// Additional attempts after the first; negative behaves like zero.
    pub max_retries: i32,
    pub insecure_skip_verify: bool,
    /// Extra PEM encoded root certificates trusted by the client.
    #[serde(skip)]
    pub pem_certificates: Vec<u8>,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 100,
            idle_conn_timeout_secs: 30,
            max_idle_conns_per_host: 16,
            max_conns_per_host: 32,
            disable_compression: false,
            max_retries: 2,
            insecure_skip_verify: false,
            pem_certificates: Vec::new(),
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn idle_conn_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_conn_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_config_from<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();
    let client_defaults = ClientConfig::default();

    let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
    let flag = |key: &str| {
        lookup(key)
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false)
    };

    let listen_addr = string_or("SVC_HTTP_LISTEN_ADDR", &defaults.listen_addr);
    let ready_path = string_or("SVC_HTTP_READY_PATH", &defaults.ready_path);
    let live_path = string_or("SVC_HTTP_LIVE_PATH", &defaults.live_path);
    let metrics_path = string_or("SVC_HTTP_METRICS_PATH", &defaults.metrics_path);

    let shutdown_timeout_secs = parse_or(
        lookup("SVC_HTTP_SHUTDOWN_TIMEOUT_SECS"),
        defaults.shutdown_timeout_secs,
    );

    let upstream_url = lookup("SVC_HTTP_UPSTREAM_URL").filter(|v| !v.is_empty());

    let debug = lookup("DEBUG").is_some();

    // Outbound client
    let pem_certificates = match lookup("SVC_HTTP_CLIENT_CA_FILE") {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("failed to read CA file {}", path))?,
        None => Vec::new(),
    };

    let client = ClientConfig {
        timeout_secs: parse_or(
            lookup("SVC_HTTP_CLIENT_TIMEOUT_SECS"),
            client_defaults.timeout_secs,
        ),
        idle_conn_timeout_secs: parse_or(
            lookup("SVC_HTTP_CLIENT_IDLE_CONN_TIMEOUT_SECS"),
            client_defaults.idle_conn_timeout_secs,
        ),
        max_idle_conns_per_host: parse_or(
            lookup("SVC_HTTP_CLIENT_MAX_IDLE_PER_HOST"),
            client_defaults.max_idle_conns_per_host,
        ),
        max_conns_per_host: parse_or(
            lookup("SVC_HTTP_CLIENT_MAX_CONNS_PER_HOST"),
            client_defaults.max_conns_per_host,
        ),
        disable_compression: flag("SVC_HTTP_CLIENT_DISABLE_COMPRESSION"),
        max_retries: parse_or(
            lookup("SVC_HTTP_CLIENT_MAX_RETRIES"),
            client_defaults.max_retries,
        ),
        insecure_skip_verify: flag("SVC_HTTP_CLIENT_INSECURE_SKIP_VERIFY"),
        pem_certificates,
        backoff_base_ms: parse_or(
            lookup("SVC_HTTP_CLIENT_BACKOFF_BASE_MS"),
            client_defaults.backoff_base_ms,
        ),
        backoff_max_ms: parse_or(
            lookup("SVC_HTTP_CLIENT_BACKOFF_MAX_MS"),
            client_defaults.backoff_max_ms,
        ),
    };

    Ok(Config {
        listen_addr,
        ready_path,
        live_path,
        metrics_path,
        shutdown_timeout_secs,
        upstream_url,
        debug,
        client,
    })
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
