//! # WhatsApp Gateway
//!
//! HTTP API in front of a browser-automation WhatsApp session.
//! Starts the session controller, serves the API and tears the client
//! down once the server stops.

#![recursion_limit = "256"]

pub mod api;
pub mod client;
pub mod config;
pub mod consts;
pub mod logger;
pub mod metric;
pub mod phone;
pub mod session;
pub mod webhook;

use anyhow::Context;
use log::info;
use logfire::config::MetricsOptions;
use ntex::web;
use ntex_cors::Cors;
use std::{sync::Arc, time::Instant};

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    config::init_config()?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;

    // Logfire when a token is configured, plain stdout logs otherwise
    let shutdown_handler = match &app_config.logfire_token {
        Some(token) => Some(
            logfire::configure()
                .install_panic_handler()
                .with_metrics(Some(MetricsOptions::default()))
                .send_to_logfire(logfire::config::SendToLogfire::Yes)
                .with_token(token)
                .finish()?,
        ),
        None => {
            logger::setup_simple_logger()?;
            logger::install_panic_logger();
            None
        }
    };

    let factory = client::bridge::BridgeClientFactory::new(app_config.bridge_settings());
    let (controller, handle, commands) = session::SessionController::new(
        app_config.reconnect_policy(),
        Arc::new(factory),
        Arc::new(session::RuntimeScheduler),
    );
    ntex::rt::spawn(controller.run(commands));
    handle.start()?;

    configure_and_run_server(handle.clone()).await?;

    handle.shutdown().await;
    info!("WhatsApp session closed");

    if let Some(shutdown_handler) = shutdown_handler {
        shutdown_handler.shutdown()?;
    }

    Ok(())
}

/// Creates application state shared by the handlers of one worker
fn create_app_state(
    session: session::SessionHandle,
    app_config: &config::AppConfig,
    started_at: Instant,
) -> api::AppState {
    api::AppState {
        session,
        send_policy: app_config.send_policy(),
        api_key: app_config.api_key.clone(),
        webhook_secret: app_config.webhook_secret.clone(),
        env: app_config.env.clone(),
        is_prod: app_config.is_prod(),
        started_at,
    }
}

/// Configures and starts the web server, returns once it stopped
async fn configure_and_run_server(handle: session::SessionHandle) -> anyhow::Result<()> {
    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    let server_addr = (
        app_config.web_server_host.clone(),
        app_config.web_server_port,
    );
    let started_at = Instant::now();

    if app_config.api_key.is_none() {
        log::warn!("API_KEY is not set, /api routes are open");
    }
    info!(
        "{name} v{version} listening on {host}:{port}",
        name = consts::SERVICE_NAME,
        version = consts::SERVICE_VERSION,
        host = server_addr.0,
        port = server_addr.1
    );

    web::server(move || {
        web::App::new()
            .wrap(
                Cors::new()
                    .allowed_methods(vec!["GET", "HEAD", "POST", "OPTIONS"])
                    .finish(),
            )
            .wrap(web::middleware::Logger::default())
            .wrap(web::middleware::Compress::default())
            .state(create_app_state(handle.clone(), app_config, started_at))
            .configure(api::routes::server)
            .configure(api::routes::whatsapp)
            .configure(webhook::routes::session)
            .default_service(web::route().to(api::server::not_found))
    })
    .bind(server_addr)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
