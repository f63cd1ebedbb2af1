// server/src/web/extractors.rs

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use atelier::models::UserIdentity;
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// The caller resolved from an `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserIdentity);

impl AuthenticatedUser {
  pub fn identity(&self) -> &UserIdentity {
    &self.0
  }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
  let raw = req.headers().get(AUTHORIZATION)?.to_str().ok()?.trim();
  let (scheme, token) = raw.split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("bearer") {
    return None;
  }
  Some(token.trim().to_string())
}

async fn resolve_session(
  state: Option<web::Data<AppState>>,
  token: Option<String>,
  path: String,
) -> Result<AuthenticatedUser, AppError> {
  let state = state.ok_or_else(|| AppError::Internal("AppState is not registered on the app.".to_string()))?;
  match state.marketplace.authenticate(token.as_deref()).await {
    Ok(user) => Ok(AuthenticatedUser(user)),
    Err(e) => {
      warn!(%path, error = %e, "Rejected request without a valid session.");
      Err(e.into())
    }
  }
}

/// Surfaces a body extraction failure only once the caller is known.
///
/// Handlers take their payload as `Result<web::Json<T>, actix_web::Error>` so a
/// malformed body from an anonymous caller still answers 401.
pub fn accepted_body<T>(body: Result<web::Json<T>, actix_web::Error>) -> Result<T, AppError> {
  body.map(web::Json::into_inner).map_err(AppError::Rejected)
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let token = bearer_token(req);
    Box::pin(resolve_session(state, token, req.path().to_string()))
  }
}
