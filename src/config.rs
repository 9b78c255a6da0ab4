use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BootstrapError, Result};
use crate::models::SolutionConfig;

pub const DEFAULT_IP_URL: &str = "https://ipapi.co/ip/";
pub const DEFAULT_GEO_URL: &str = "https://cors.joles.xyz/http://www.geoplugin.net/json.gp?ip={ip}";

/// Main configuration structure for the widget bootstrap (the host's `leopardConfig`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub redis: RedisConfig,
    pub solution: SolutionSourceConfig,
    pub geo: GeoConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub is_production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Namespace prefix for every cache key
    pub storage_key: String,
    /// "memory" or "redis"
    pub backend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub pool: PoolConfig,
    /// 0 disables expiry
    pub default_ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub recycle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionSourceConfig {
    pub load_fresh_config_for_new_sessions: bool,
    pub must_get_static_default_config: bool,
    /// Build-time default solution config (YAML or JSON file)
    #[serde(default)]
    pub build_config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub must_send_location_at_login: bool,
    #[serde(default)]
    pub ip_url: Option<String>,
    #[serde(default)]
    pub geo_url: Option<String>,
}

impl GeoConfig {
    /// Configured IP lookup endpoint, or the public default
    pub fn ip_url(&self) -> &str {
        self.ip_url.as_deref().unwrap_or(DEFAULT_IP_URL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub max_attempts: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_rocket: Option<String>,
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("TENEO_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("TENEO_PRODUCTION") {
            if let Some(b) = parse_flag(&v) {
                self.server.is_production = b;
            }
        }

        // Storage overrides
        if let Ok(key) = env::var("TENEO_STORAGE_KEY") {
            self.storage.storage_key = key;
        }
        if let Ok(backend) = env::var("TENEO_CACHE") {
            self.storage.backend = backend.to_lowercase();
        }

        // Redis overrides
        if let Ok(host) = env::var("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Ok(port) = env::var("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }
        if let Ok(ttl) = env::var("TENEO_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse() {
                self.redis.default_ttl_seconds = ttl;
            }
        }

        // Solution source overrides
        if let Ok(v) = env::var("TENEO_LOAD_FRESH_CONFIG") {
            if let Some(b) = parse_flag(&v) {
                self.solution.load_fresh_config_for_new_sessions = b;
            }
        }
        if let Ok(v) = env::var("TENEO_MUST_GET_STATIC_CONFIG") {
            if let Some(b) = parse_flag(&v) {
                self.solution.must_get_static_default_config = b;
            }
        }
        if let Ok(path) = env::var("TENEO_BUILD_CONFIG_PATH") {
            self.solution.build_config_path = Some(path);
        }

        // Geo overrides
        if let Ok(v) = env::var("TENEO_SEND_LOCATION") {
            if let Some(b) = parse_flag(&v) {
                self.geo.must_send_location_at_login = b;
            }
        }
        if let Ok(url) = env::var("TENEO_IP_URL") {
            self.geo.ip_url = Some(url);
        }
        if let Ok(url) = env::var("TENEO_GEO_URL") {
            self.geo.geo_url = Some(url);
        }

        // HTTP overrides
        if let Ok(timeout) = env::var("TENEO_HTTP_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.http.timeout_ms = ms;
            }
        }
        if let Ok(attempts) = env::var("TENEO_HTTP_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.http.max_attempts = n;
            }
        }

        // Telemetry
        if let Ok(id) = env::var("LOGROCKET_APP_ID") {
            self.logging.log_rocket = Some(id);
        }
        if let Ok(dsn) = env::var("SENTRY_DSN") {
            self.logging.sentry_dsn = Some(dsn);
        }
    }

    /// Validate configuration
    fn validate(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        if self.storage.storage_key.is_empty() {
            return Err("storage_key cannot be empty".into());
        }
        if !matches!(self.storage.backend.as_str(), "memory" | "redis") {
            return Err(format!(
                "Unknown cache backend '{}' (expected memory or redis)",
                self.storage.backend
            )
            .into());
        }
        if self.redis.port == 0 {
            return Err("Redis port cannot be 0".into());
        }
        if self.http.timeout_ms == 0 {
            return Err("HTTP timeout cannot be 0".into());
        }
        if self.http.max_attempts == 0 {
            return Err("HTTP max_attempts cannot be 0".into());
        }
        if !self.solution.must_get_static_default_config
            && self.solution.build_config_path.is_none()
        {
            return Err(
                "No build_config_path set and static config disabled - bootstrap will fail".into(),
            );
        }
        Ok(())
    }

    /// Get Redis URL with password from environment
    pub fn get_redis_url(&self) -> String {
        let password = env::var("REDIS_PASSWORD")
            .or_else(|_| env::var("REDIS_PASS"))
            .unwrap_or_default();

        if password.is_empty() {
            format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.database
            )
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis.host, self.redis.port, self.redis.database
            )
        }
    }

    /// Get pool timeout as Duration
    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }

    /// Get pool create timeout as Duration
    pub fn get_pool_create_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.create_timeout_seconds)
    }

    /// Get pool recycle timeout as Duration
    pub fn get_pool_recycle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.recycle_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_ms)
    }

    /// Read the build-time default solution config, if one is configured
    pub fn load_build_config(&self) -> Result<Option<SolutionConfig>> {
        let Some(path) = self.solution.build_config_path.as_deref() else {
            return Ok(None);
        };
        let contents = fs::read_to_string(path).map_err(|e| {
            BootstrapError::Config(format!("Failed to read build config {path}: {e}"))
        })?;
        let config = if path.ends_with(".json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                BootstrapError::Config(format!("Failed to parse build config {path}: {e}"))
            })?
        };
        tracing::info!("Loaded build solution config from {}", path);
        Ok(Some(config))
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.server.is_production
            && (self.logging.log_rocket.is_some() || self.logging.sentry_dsn.is_some())
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "teneo-bootstrap".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                is_production: false,
            },
            storage: StorageConfig {
                storage_key: "teneo-chat-".to_string(),
                backend: "memory".to_string(),
            },
            redis: RedisConfig {
                host: "localhost".to_string(),
                port: 6379,
                database: 0,
                pool: PoolConfig {
                    max_size: 4,
                    timeout_seconds: 5,
                    create_timeout_seconds: 5,
                    recycle_timeout_seconds: 5,
                },
                default_ttl_seconds: 0,
            },
            solution: SolutionSourceConfig {
                load_fresh_config_for_new_sessions: false,
                must_get_static_default_config: true,
                build_config_path: None,
            },
            geo: GeoConfig {
                must_send_location_at_login: false,
                ip_url: None,
                geo_url: None,
            },
            http: HttpConfig {
                timeout_ms: 3000,
                max_attempts: 1,
            },
            logging: LoggingConfig {
                log_rocket: None,
                sentry_dsn: None,
            },
        }
    }
}
