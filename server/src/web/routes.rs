// server/src/web/routes.rs

use actix_web::error::{JsonPayloadError, PathError};
use actix_web::{web, HttpRequest};
use atelier::MarketError;
use tracing::warn;

use crate::errors::AppError;
use crate::web::handlers::{cart_handlers, order_handlers, product_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn unknown_route_handler(req: HttpRequest) -> Result<actix_web::HttpResponse, AppError> {
  Err(MarketError::NotFound(format!("No route for {} {}.", req.method(), req.path())).into())
}

// Body and path rejections render as `{"error": ...}` like every other failure.
fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
  warn!(path = %req.path(), error = %err, "Rejected request body.");
  AppError::from(MarketError::Validation(format!("Invalid request body: {}", err))).into()
}

fn path_error_handler(err: PathError, req: &HttpRequest) -> actix_web::Error {
  warn!(path = %req.path(), error = %err, "Rejected path parameter.");
  AppError::from(MarketError::Validation(format!("Invalid path parameter: {}", err))).into()
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .app_data(web::JsonConfig::default().error_handler(json_error_handler))
      .app_data(web::PathConfig::default().error_handler(path_error_handler))
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::get_cart_handler))
          .route("", web::post().to(cart_handlers::add_to_cart_handler))
          .route("/{item_id}", web::put().to(cart_handlers::update_cart_item_handler))
          .route("/{item_id}", web::delete().to(cart_handlers::remove_cart_item_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}", web::put().to(order_handlers::update_order_status_handler)),
      )
      .service(
        web::scope("/products")
          .route("/{product_id}", web::get().to(product_handlers::get_product_handler))
          .route("/{product_id}", web::put().to(product_handlers::update_product_handler))
          .route("/{product_id}", web::delete().to(product_handlers::delete_product_handler)),
      )
      .default_service(web::to(unknown_route_handler)),
  );
}
