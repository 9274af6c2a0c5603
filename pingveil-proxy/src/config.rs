use std::env::var;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;

/// Process configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the Minecraft-facing listener binds to
    /// Env: LISTEN_ADDR (default: "0.0.0.0:25565")
    pub listen_addr: String,

    /// Admin HTTP port
    /// Env: ADMIN_PORT (default: 8080)
    pub admin_port: u16,

    /// Name of the backend to mirror
    /// Env: BACKEND_NAME (default: "lobby")
    pub backend_name: String,

    /// Env: BACKEND_HOST (default: "127.0.0.1")
    pub backend_host: String,

    /// Env: BACKEND_PORT (default: 25566)
    pub backend_port: u16,

    /// Upper bound on one backend status query
    /// Env: FETCH_TIMEOUT_MS (default: 3000)
    pub fetch_timeout: Duration,

    /// How long a new connection may take to send its handshake
    /// Env: HANDSHAKE_TIMEOUT_MS (default: 5000)
    pub handshake_timeout: Duration,

    /// Path of the ping rewrite settings file
    /// Env: REWRITE_CONFIG_PATH (default: "pingveil.toml")
    pub rewrite_config_path: PathBuf,

    /// MOTD of the proxy's own reply, used when a ping is not rewritten
    /// Env: FALLBACK_MOTD (default: "A Minecraft Proxy")
    pub fallback_motd: String,

    /// Env: FALLBACK_MAX_PLAYERS (default: 500)
    pub fallback_max_players: u32,

    /// Version label of the proxy's own reply
    /// Env: FALLBACK_VERSION_NAME (default: "pingveil")
    pub fallback_version_name: String,

    /// Request body size limit for the admin surface in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 65536 = 64KB)
    pub request_body_limit: usize,

    /// Admin request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Rate limit for /reload (requests per second)
    /// Env: RATE_LIMIT_RELOAD_PER_SEC (default: 1)
    pub rate_limit_reload_per_sec: u64,

    /// Burst size for /reload
    /// Env: RATE_LIMIT_RELOAD_BURST (default: 5)
    pub rate_limit_reload_burst: u32,

    /// Rate limit for read-only admin endpoints (requests per second)
    /// Env: RATE_LIMIT_GENERAL_PER_SEC (default: 10)
    pub rate_limit_general_per_sec: u64,

    /// Burst size for read-only admin endpoints
    /// Env: RATE_LIMIT_GENERAL_BURST (default: 20)
    pub rate_limit_general_burst: u32,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv();
        let defaults = Self::default();
        Self {
            listen_addr: env_or_default_string("LISTEN_ADDR", &defaults.listen_addr),
            admin_port: env_or_default("ADMIN_PORT", defaults.admin_port),
            backend_name: env_or_default_string("BACKEND_NAME", &defaults.backend_name),
            backend_host: env_or_default_string("BACKEND_HOST", &defaults.backend_host),
            backend_port: env_or_default("BACKEND_PORT", defaults.backend_port),
            fetch_timeout: Duration::from_millis(env_or_default("FETCH_TIMEOUT_MS", 3000)),
            handshake_timeout: Duration::from_millis(env_or_default("HANDSHAKE_TIMEOUT_MS", 5000)),
            rewrite_config_path: PathBuf::from(env_or_default_string(
                "REWRITE_CONFIG_PATH",
                "pingveil.toml",
            )),
            fallback_motd: env_or_default_string("FALLBACK_MOTD", &defaults.fallback_motd),
            fallback_max_players: env_or_default(
                "FALLBACK_MAX_PLAYERS",
                defaults.fallback_max_players,
            ),
            fallback_version_name: env_or_default_string(
                "FALLBACK_VERSION_NAME",
                &defaults.fallback_version_name,
            ),
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", defaults.request_body_limit),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            rate_limit_reload_per_sec: env_or_default(
                "RATE_LIMIT_RELOAD_PER_SEC",
                defaults.rate_limit_reload_per_sec,
            ),
            rate_limit_reload_burst: env_or_default(
                "RATE_LIMIT_RELOAD_BURST",
                defaults.rate_limit_reload_burst,
            ),
            rate_limit_general_per_sec: env_or_default(
                "RATE_LIMIT_GENERAL_PER_SEC",
                defaults.rate_limit_general_per_sec,
            ),
            rate_limit_general_burst: env_or_default(
                "RATE_LIMIT_GENERAL_BURST",
                defaults.rate_limit_general_burst,
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:25565".to_string(),
            admin_port: 8080,
            backend_name: "lobby".to_string(),
            backend_host: "127.0.0.1".to_string(),
            backend_port: 25566,
            fetch_timeout: Duration::from_millis(3000),
            handshake_timeout: Duration::from_millis(5000),
            rewrite_config_path: PathBuf::from("pingveil.toml"),
            fallback_motd: "A Minecraft Proxy".to_string(),
            fallback_max_players: 500,
            fallback_version_name: "pingveil".to_string(),
            request_body_limit: 64 * 1024, // 64 KB
            request_timeout: Duration::from_secs(30),
            rate_limit_reload_per_sec: 1,
            rate_limit_reload_burst: 5,
            rate_limit_general_per_sec: 10,
            rate_limit_general_burst: 20,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
