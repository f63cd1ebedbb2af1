// server/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{accepted_body, AuthenticatedUser};

#[derive(Deserialize, Debug)]
pub struct AddToCartRequestPayload {
  pub product_id: Uuid,
  pub quantity: i32,
}

#[derive(Deserialize, Debug)]
pub struct UpdateCartItemPayload {
  pub quantity: i64,
}

/// The caller's cart grouped by store, with per-store subtotals.
#[instrument(name = "handler::get_cart", skip(app_state, auth_user), fields(user_id = %auth_user.0.id))]
pub async fn get_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let cart = app_state.marketplace.grouped_cart(auth_user.identity()).await?;

  let stores: Vec<_> = cart
    .stores
    .values()
    .map(|group| {
      json!({
        "store_id": group.store_id,
        "store_name": group.store_name,
        "store_logo": group.store_logo,
        "items": group.items,
        "subtotal": group.subtotal(),
      })
    })
    .collect();

  Ok(HttpResponse::Ok().json(json!({
    "stores": stores,
    "item_count": cart.item_count(),
    "total_quantity": cart.total_quantity(),
    "total_amount": cart.total_amount(),
    "dropped_rows": cart.dropped_rows,
  })))
}

#[instrument(name = "handler::add_to_cart", skip(app_state, auth_user, req_payload), fields(user_id = %auth_user.0.id))]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: Result<web::Json<AddToCartRequestPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
  let req_payload = accepted_body(req_payload)?;
  let row = app_state
    .marketplace
    .add_to_cart(auth_user.identity(), req_payload.product_id, req_payload.quantity)
    .await?;
  info!(cart_item_id = %row.id, "Cart row created.");
  Ok(HttpResponse::Created().json(json!({ "cart_item": row })))
}

/// A quantity below 1 removes the row.
#[instrument(name = "handler::update_cart_item", skip(app_state, auth_user, req_payload), fields(user_id = %auth_user.0.id))]
pub async fn update_cart_item_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
  req_payload: Result<web::Json<UpdateCartItemPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
  let req_payload = accepted_body(req_payload)?;
  let item_id = path.into_inner();
  let row = app_state
    .marketplace
    .set_cart_quantity(auth_user.identity(), item_id, req_payload.quantity)
    .await?;
  Ok(HttpResponse::Ok().json(json!({
    "cart_item": row,
    "removed": row.is_none(),
  })))
}

#[instrument(name = "handler::remove_cart_item", skip(app_state, auth_user), fields(user_id = %auth_user.0.id))]
pub async fn remove_cart_item_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  app_state
    .marketplace
    .remove_cart_item(auth_user.identity(), path.into_inner())
    .await?;
  Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
  use super::super::test_support::{bearer, Fixture, CUSTOMER_TOKEN};
  use crate::web::configure_app_routes;
  use actix_web::http::StatusCode;
  use actix_web::{test, web, App};
  use atelier::gateway::Gateway;
  use serde_json::{json, Value};

  #[actix_web::test]
  async fn cart_requires_a_session() {
    let fx = Fixture::new();
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/cart").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
      &app,
      test::TestRequest::get()
        .uri("/api/cart")
        .insert_header(bearer("not-a-session"))
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[actix_web::test]
  async fn added_rows_come_back_grouped_by_store() {
    let fx = Fixture::new();
    let shirt = fx.product("Linen Shirt", 4500, 10);
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/cart")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({ "product_id": shirt.id, "quantity": 2 }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
      .uri("/api/cart")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let stores = body["stores"].as_array().expect("stores array");
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0]["store_name"], "Linen House");
    assert_eq!(body["item_count"], 1);
    assert_eq!(body["total_quantity"], 2);
    assert_eq!(body["dropped_rows"], 0);
  }

  #[actix_web::test]
  async fn zero_quantity_update_removes_the_row() {
    let fx = Fixture::new();
    let shirt = fx.product("Linen Shirt", 4500, 10);
    let row = fx
      .gateway
      .insert_cart_item(fx.customer.id, shirt.id, 1)
      .await
      .expect("seed cart row");
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::put()
      .uri(&format!("/api/cart/{}", row.id))
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({ "quantity": 0 }))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["removed"], true);
    assert!(fx
      .gateway
      .list_cart_items(fx.customer.id)
      .await
      .expect("list rows")
      .is_empty());

    let req = test::TestRequest::delete()
      .uri(&format!("/api/cart/{}", row.id))
      .insert_header(bearer(CUSTOMER_TOKEN))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[actix_web::test]
  async fn invalid_quantity_is_a_bad_request() {
    let fx = Fixture::new();
    let shirt = fx.product("Linen Shirt", 4500, 10);
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/cart")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({ "product_id": shirt.id, "quantity": 0 }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }
}
