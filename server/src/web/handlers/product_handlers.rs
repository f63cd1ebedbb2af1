// server/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use atelier::models::ProductPatch;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{accepted_body, AuthenticatedUser};

#[instrument(name = "handler::get_product", skip(app_state))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.marketplace.product(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(product))
}

/// Partial edit by the merchant who owns the product's store.
#[instrument(name = "handler::update_product", skip(app_state, auth_user, patch), fields(actor_id = %auth_user.0.id))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
  patch: Result<web::Json<ProductPatch>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
  let patch = accepted_body(patch)?;
  let product = app_state
    .marketplace
    .update_product(auth_user.identity(), path.into_inner(), &patch)
    .await?;
  info!(product_id = %product.id, "Product edited via API.");
  Ok(HttpResponse::Ok().json(json!({ "product": product })))
}

#[instrument(name = "handler::delete_product", skip(app_state, auth_user), fields(actor_id = %auth_user.0.id))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  app_state
    .marketplace
    .delete_product(auth_user.identity(), path.into_inner())
    .await?;
  Ok(HttpResponse::NoContent().finish())
}
