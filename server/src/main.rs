// server/src/main.rs

mod config;
mod db;
mod errors;
mod state;
mod web;

use crate::config::{AppConfig, LogFormat};
use crate::db::PgGateway;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use atelier::gateway::SharedGateway;
use atelier::Marketplace;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // span close events carry durations
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Text => builder.init(),
  }
}

/// Periodically moves stale reservations to `expired`.
fn spawn_expiry_task(state: AppState, ttl_minutes: i64) {
  let ttl = chrono::Duration::minutes(ttl_minutes);
  actix_web::rt::spawn(async move {
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    loop {
      ticker.tick().await;
      match state.marketplace.expire_stale_reservations(ttl).await {
        Ok(expired) if !expired.is_empty() => {
          tracing::info!(count = expired.len(), "Expired stale reservations.");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Reservation expiry sweep failed."),
      }
    }
  });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  dotenvy::dotenv().ok();
  let log_format = match LogFormat::from_env() {
    Ok(format) => format,
    Err(e) => {
      init_tracing(LogFormat::Text);
      tracing::error!(error = %e, "Failed to read the log format.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };
  init_tracing(log_format);

  tracing::info!("Starting marketplace server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let db_pool = match PgPoolOptions::new()
    .max_connections(app_config.database_max_connections)
    .connect(&app_config.database_url)
    .await
  {
    Ok(pool) => {
      tracing::info!("Successfully connected to the database.");
      pool
    }
    Err(e) => {
      tracing::error!(error = %e, "Failed to connect to the database.");
      return Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string()));
    }
  };

  if app_config.run_migrations {
    if let Err(e) = sqlx::migrate!("./migrations").run(&db_pool).await {
      let e = errors::AppError::from(e);
      tracing::error!(error = %e, "Failed to run database migrations.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
    tracing::info!("Database migrations applied.");
  }

  let gateway: SharedGateway = Arc::new(PgGateway::new(db_pool));
  let app_state = AppState::new(Marketplace::new(gateway, app_config.checkout_settings()));

  if let Some(ttl_minutes) = app_config.reservation_ttl_minutes {
    spawn_expiry_task(app_state.clone(), ttl_minutes);
    tracing::info!(ttl_minutes, "Reservation expiry task started.");
  }

  let server_address = app_config.bind_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
