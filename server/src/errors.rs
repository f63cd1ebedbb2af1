// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use atelier::MarketError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Market(#[from] MarketError),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("Internal Server Error: {0}")]
  Internal(String),

  /// A body or path extractor rejected the request; its response is already rendered.
  #[error("Rejected Request: {0}")]
  Rejected(actix_web::Error),
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Market(err) => match err {
        MarketError::Validation(_) => StatusCode::BAD_REQUEST,
        MarketError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::InvalidTransition { .. }
        | MarketError::InsufficientStock { .. }
        | MarketError::PickupCodeExhausted { .. } => StatusCode::CONFLICT,
        MarketError::Gateway(_) | MarketError::Flow { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      },
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Migrate(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      AppError::Rejected(err) => err.as_response_error().status_code(),
    }
  }

  fn error_response(&self) -> HttpResponse {
    if let AppError::Rejected(err) = self {
      return err.error_response();
    }
    let status = self.status_code();
    // Server-side details stay in the logs.
    let message = if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with server error");
      "An internal error occurred. Please try again.".to_string()
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with client error");
      match self {
        AppError::Market(err) => client_message(err),
        other => other.to_string(),
      }
    };
    HttpResponse::build(status).json(json!({ "error": message }))
  }
}

fn client_message(err: &MarketError) -> String {
  match err {
    MarketError::Validation(m)
    | MarketError::Unauthenticated(m)
    | MarketError::Forbidden(m)
    | MarketError::NotFound(m) => m.clone(),
    other => other.to_string(),
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
