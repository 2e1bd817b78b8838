// src/main.rs
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Compress, DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Module declarations
mod config;
mod error;
mod filters;
mod handlers;
mod import_export;
mod models;
mod planning;
mod session;
mod sheet_handlers;

use config::{load_config, Config};
use error::{ApiError, ApiResult};
use planning::RecalculationEngine;
use session::SessionStore;

pub struct AppState {
    pub config: Config,
    pub engine: RecalculationEngine,
    session: RwLock<SessionStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            engine: RecalculationEngine::new(config.planning.coverage_basis),
            session: RwLock::new(SessionStore::new()),
            config,
        }
    }

    pub fn session(&self) -> ApiResult<RwLockReadGuard<'_, SessionStore>> {
        self.session
            .read()
            .map_err(|_| ApiError::InternalServerError("Session lock poisoned".to_string()))
    }

    pub fn session_mut(&self) -> ApiResult<RwLockWriteGuard<'_, SessionStore>> {
        self.session
            .write()
            .map_err(|_| ApiError::InternalServerError("Session lock poisoned".to_string()))
    }

    pub fn wildcard(&self) -> &str {
        &self.config.planning.filter_wildcard
    }
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;

    if config.is_production() {
        validate_production_config(&config)?;
    }
    config.print_startup_info();

    let app_state = Arc::new(AppState::new(config.clone()));

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let server_config = config.clone();
    let mut server = HttpServer::new(move || {
        let cors = setup_improved_cors(&server_config.security.allowed_origins, server_config.is_production());
        let security_headers = setup_security_headers(&server_config.security);

        App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(server_config.security.max_json_bytes))
            .route("/health", web::get().to(handlers::health_check))
            .configure(sheet_handlers::configure)
    })
    .keep_alive(std::time::Duration::from_secs(config.server.keep_alive))
    .client_request_timeout(std::time::Duration::from_secs(config.server.client_timeout))
    .client_disconnect_timeout(std::time::Duration::from_secs(config.server.client_shutdown));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

pub fn setup_improved_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::USER_AGENT,
            header::REFERER,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH, header::CONTENT_DISPOSITION])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("⚠️  Using wildcard CORS (*) in development mode");
        cors = cors.allow_any_origin().allow_any_header().allow_any_method();
    } else {
        for origin in allowed_origins.iter().filter(|o| !o.is_empty() && *o != "*") {
            log::debug!("Adding CORS origin: {}", origin);
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let level = config.logging.level.as_str();
            tracing_subscriber::EnvFilter::new(level)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(config.logging.ansi))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

fn validate_production_config(config: &Config) -> anyhow::Result<()> {
    if config.security.allowed_origins.iter().any(|o| o == "*") {
        anyhow::bail!("Wildcard CORS origins not allowed in production!");
    }

    Ok(())
}

fn setup_security_headers(config: &crate::config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload"
        ));
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_rejects_wildcard_origin() {
        let mut config = Config::default();
        assert!(validate_production_config(&config).is_ok());
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(validate_production_config(&config).is_err());
    }

    #[test]
    fn test_app_state_uses_configured_basis() {
        let mut config = Config::default();
        config.planning.coverage_basis = planning::CoverageBasis::OnHand;
        config.planning.filter_wildcard = "All".to_string();
        let state = AppState::new(config);
        assert_eq!(state.engine.deriver().basis(), planning::CoverageBasis::OnHand);
        assert_eq!(state.wildcard(), "All");
        assert!(state.session().unwrap().workbook().is_err());
    }
}
