// src/config.rs - Configuration management
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::filters::DEFAULT_WILDCARD;
use crate::planning::CoverageBasis;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub planning: PlanningConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
    pub client_shutdown: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Largest accepted workbook upload.
    pub max_upload_bytes: usize,
    /// Largest accepted JSON body (edited rows).
    pub max_json_bytes: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub ansi: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlanningConfig {
    pub coverage_basis: CoverageBasis,
    pub filter_wildcard: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: Some(1),
            keep_alive: 30,
            client_timeout: 30,
            client_shutdown: 5,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:8080".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_upload_bytes: 50 * 1024 * 1024,
            max_json_bytes: 16 * 1024 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            coverage_basis: CoverageBasis::default(),
            filter_wildcard: DEFAULT_WILDCARD.to_string(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = match env::var("CONFIG_FILE") {
        Ok(config_file) => Config::from_file(&config_file)?,
        Err(_) => Config::default(),
    };

    override_with_env(&mut config, |key| env::var(key).ok())?;

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", raw, key, e))
}

/// Applies environment overrides. `lookup` stands in for `std::env::var`.
fn override_with_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("BIND_ADDRESS") {
        config.server.host = host;
    }
    if let Some(port) = lookup("SOP_PORT") {
        config.server.port = parse_var("SOP_PORT", &port)?;
    }
    if let Some(workers) = lookup("SOP_WORKERS") {
        config.server.workers = Some(parse_var("SOP_WORKERS", &workers)?);
    }
    if let Some(origins_str) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(limit) = lookup("SOP_MAX_UPLOAD_BYTES") {
        config.security.max_upload_bytes = parse_var("SOP_MAX_UPLOAD_BYTES", &limit)?;
    }
    if let Some(basis) = lookup("SOP_COVERAGE_BASIS") {
        config.planning.coverage_basis = parse_var("SOP_COVERAGE_BASIS", &basis)?;
    }
    if let Some(wildcard) = lookup("SOP_FILTER_WILDCARD") {
        config.planning.filter_wildcard = wildcard.trim().to_string();
    }
    if let Some(level) = lookup("RUST_LOG") {
        config.logging.level = level;
    }

    Ok(())
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server.port must not be 0"));
        }

        if self.server.workers == Some(0) {
            return Err(anyhow::anyhow!("server.workers must be at least 1"));
        }

        if self.security.max_upload_bytes == 0 || self.security.max_json_bytes == 0 {
            return Err(anyhow::anyhow!("Request size limits must be greater than 0"));
        }

        if self.planning.filter_wildcard.trim().is_empty() {
            return Err(anyhow::anyhow!("planning.filter_wildcard must not be empty"));
        }

        tracing_subscriber::EnvFilter::try_new(&self.logging.level)
            .with_context(|| format!("Invalid log level: {}", self.logging.level))?;

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        env::var("SOP_ENV").map(|v| v == "production").unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("📦 S&OP editor starting up...");
        log::info!("🌐 Server: {}:{} ({} workers)",
            self.server.host,
            self.server.port,
            self.server.workers.map(|w| w.to_string()).unwrap_or_else(|| "default".to_string()));
        log::info!("📐 Coverage basis: {}", self.planning.coverage_basis);
        log::info!("📊 Logging: {} level", self.logging.level);

        if !self.is_production() {
            log::warn!("🚧 Running in development mode");
        }

        if self.security.require_https {
            log::info!("🔒 HTTPS enforcement enabled");
        } else if self.is_production() {
            log::warn!("⚠️  HTTPS not required in production mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}
