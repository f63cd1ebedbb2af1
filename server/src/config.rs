// server/src/config.rs

use crate::errors::{AppError, Result};
use atelier::CheckoutSettings;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Text,
  Json,
}

impl FromStr for LogFormat {
  type Err = AppError;

  fn from_str(raw: &str) -> Result<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "text" | "" => Ok(LogFormat::Text),
      "json" => Ok(LogFormat::Json),
      other => Err(AppError::Config(format!("Invalid LOG_FORMAT '{}': expected text or json", other))),
    }
  }
}

impl LogFormat {
  /// Read on its own because the subscriber is installed before `AppConfig` loads.
  /// Unset means text; an unknown value is a configuration error.
  pub fn from_env() -> Result<Self> {
    env::var("LOG_FORMAT").unwrap_or_default().parse()
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub database_max_connections: u32,
  pub pickup_code_length: usize,
  pub pickup_code_attempts: u32,
  /// Unset disables the background expiry of stale reservations.
  pub reservation_ttl_minutes: Option<i64>,
  pub run_migrations: bool,
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  env::var(name)
    .unwrap_or_else(|_| default.to_string())
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok(); // Load .env file if present

    let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = parse_var::<u16>("SERVER_PORT", "8080")?;
    let database_url = env::var("DATABASE_URL")
      .map_err(|e| AppError::Config(format!("Missing environment variable 'DATABASE_URL': {}", e)))?;
    let database_max_connections = parse_var::<u32>("DATABASE_MAX_CONNECTIONS", "10")?;

    let pickup_code_length = parse_var::<usize>("PICKUP_CODE_LENGTH", "6")?;
    if !(4..=16).contains(&pickup_code_length) {
      return Err(AppError::Config(format!(
        "PICKUP_CODE_LENGTH must be between 4 and 16, got {}",
        pickup_code_length
      )));
    }
    let pickup_code_attempts = parse_var::<u32>("PICKUP_CODE_ATTEMPTS", "5")?;
    if pickup_code_attempts == 0 {
      return Err(AppError::Config("PICKUP_CODE_ATTEMPTS must be at least 1".to_string()));
    }

    let reservation_ttl_minutes = match env::var("RESERVATION_TTL_MINUTES") {
      Ok(raw) if !raw.trim().is_empty() => {
        let minutes = raw
          .trim()
          .parse::<i64>()
          .map_err(|e| AppError::Config(format!("Invalid RESERVATION_TTL_MINUTES: {}", e)))?;
        if minutes <= 0 {
          return Err(AppError::Config("RESERVATION_TTL_MINUTES must be positive".to_string()));
        }
        Some(minutes)
      }
      _ => None,
    };

    let run_migrations = parse_var::<bool>("RUN_MIGRATIONS", "false")?;

    tracing::info!(
      %server_host,
      server_port,
      database_max_connections,
      pickup_code_length,
      reservation_ttl_minutes = ?reservation_ttl_minutes,
      run_migrations,
      "Application configuration loaded successfully."
    );

    Ok(Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      pickup_code_length,
      pickup_code_attempts,
      reservation_ttl_minutes,
      run_migrations,
    })
  }

  pub fn checkout_settings(&self) -> CheckoutSettings {
    CheckoutSettings {
      pickup_code_length: self.pickup_code_length,
      max_code_attempts: self.pickup_code_attempts,
    }
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}
