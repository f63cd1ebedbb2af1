// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use atelier::models::OrderStatus;
use atelier::{MarketError, MerchantAction, OrderSubmission};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{accepted_body, AuthenticatedUser};

/// Either a raw target status or one of the merchant UI actions.
#[derive(Deserialize, Debug)]
pub struct UpdateOrderStatusPayload {
  pub status: Option<OrderStatus>,
  pub action: Option<MerchantAction>,
}

impl UpdateOrderStatusPayload {
  fn target(&self) -> Result<OrderStatus, MarketError> {
    match (self.status, self.action) {
      (Some(status), None) => Ok(status),
      (None, Some(action)) => Ok(action.target_status()),
      (Some(status), Some(action)) if action.target_status() == status => Ok(status),
      (Some(_), Some(_)) => Err(MarketError::Validation(
        "'status' and 'action' disagree.".to_string(),
      )),
      (None, None) => Err(MarketError::Validation(
        "Provide a 'status' or an 'action'.".to_string(),
      )),
    }
  }
}

#[instrument(name = "handler::list_orders", skip(app_state, auth_user), fields(actor_id = %auth_user.0.id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.marketplace.list_orders(auth_user.identity()).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

/// Places one store's order from the submitted lines.
#[instrument(name = "handler::create_order", skip(app_state, auth_user, submission), fields(customer_id = %auth_user.0.id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  submission: Result<web::Json<OrderSubmission>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
  let submission = accepted_body(submission)?;
  let store_id = submission.store_id;
  let placed = app_state
    .marketplace
    .submit_order(auth_user.identity(), submission, None)
    .await?;
  info!(order_id = %placed.order.id, %store_id, "Order created via API.");
  Ok(HttpResponse::Created().json(placed))
}

/// The order with its items. Merchants also get the actions available for its status.
#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(actor_id = %auth_user.0.id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let actor = auth_user.identity();
  let detail = app_state.marketplace.order_detail(actor, path.into_inner()).await?;
  let actions = if actor.is_merchant() && detail.order.customer_id != actor.id {
    MerchantAction::available_for(detail.order.status)
  } else {
    Vec::new()
  };
  Ok(HttpResponse::Ok().json(json!({ "order": detail, "actions": actions })))
}

#[instrument(name = "handler::update_order_status", skip(app_state, auth_user, req_payload), fields(actor_id = %auth_user.0.id))]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
  req_payload: Result<web::Json<UpdateOrderStatusPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
  let req_payload = accepted_body(req_payload)?;
  let next = req_payload.target()?;
  let order = app_state
    .marketplace
    .transition_order(auth_user.identity(), path.into_inner(), next)
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[cfg(test)]
mod tests {
  use super::super::test_support::{bearer, Fixture, CUSTOMER_TOKEN, MERCHANT_TOKEN, OTHER_MERCHANT_TOKEN};
  use crate::web::configure_app_routes;
  use actix_web::http::StatusCode;
  use actix_web::{test, web, App};
  use atelier::gateway::Gateway;
  use serde_json::{json, Value};

  #[actix_web::test]
  async fn checkout_then_merchant_walks_the_lifecycle() {
    let fx = Fixture::new();
    let shirt = fx.product("Linen Shirt", 4500, 5);
    fx.gateway
      .insert_cart_item(fx.customer.id, shirt.id, 2)
      .await
      .expect("seed cart row");
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({
        "store_id": fx.store.id,
        "items": [{ "product_id": shirt.id, "quantity": 2, "price": "45.00" }],
        "total_amount": "90.00"
      }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let placed: Value = test::read_body_json(resp).await;
    let order_id = placed["order"]["id"].as_str().expect("order id").to_string();
    assert_eq!(placed["order"]["status"], "reserved");
    assert_eq!(placed["pickup_code"].as_str().map(str::len), Some(6));

    assert_eq!(fx.gateway.product(shirt.id).expect("product").stock_quantity, 3);
    assert!(fx
      .gateway
      .list_cart_items(fx.customer.id)
      .await
      .expect("list rows")
      .is_empty());

    let req = test::TestRequest::get()
      .uri(&format!("/api/orders/{}", order_id))
      .insert_header(bearer(MERCHANT_TOKEN))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["actions"], json!(["confirm", "cancel"]));
    assert_eq!(body["order"]["items"].as_array().map(Vec::len), Some(1));

    for (payload, expected) in [
      (json!({ "action": "confirm" }), "confirmed"),
      (json!({ "status": "ready" }), "ready"),
      (json!({ "action": "mark_delivered" }), "completed"),
    ] {
      let req = test::TestRequest::put()
        .uri(&format!("/api/orders/{}", order_id))
        .insert_header(bearer(MERCHANT_TOKEN))
        .set_json(payload)
        .to_request();
      let body: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(body["order"]["status"], expected);
    }

    let req = test::TestRequest::put()
      .uri(&format!("/api/orders/{}", order_id))
      .insert_header(bearer(MERCHANT_TOKEN))
      .set_json(json!({ "action": "cancel" }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
  }

  #[actix_web::test]
  async fn mismatched_total_is_rejected_without_side_effects() {
    let fx = Fixture::new();
    let shirt = fx.product("Linen Shirt", 4500, 5);
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({
        "store_id": fx.store.id,
        "items": [{ "product_id": shirt.id, "quantity": 1, "price": "45.00" }],
        "total_amount": "10.00"
      }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fx.gateway.order_count(), 0);
    assert_eq!(fx.gateway.product(shirt.id).expect("product").stock_quantity, 5);
  }

  #[actix_web::test]
  async fn stock_shortfall_is_a_conflict() {
    let fx = Fixture::new();
    let shirt = fx.product("Linen Shirt", 4500, 1);
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({
        "store_id": fx.store.id,
        "items": [{ "product_id": shirt.id, "quantity": 2, "price": "45.00" }],
        "total_amount": "90.00"
      }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
    assert_eq!(fx.gateway.order_count(), 0);
  }

  #[actix_web::test]
  async fn unrelated_users_cannot_read_or_move_orders() {
    let fx = Fixture::new();
    let shirt = fx.product("Linen Shirt", 4500, 5);
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({
        "store_id": fx.store.id,
        "items": [{ "product_id": shirt.id, "quantity": 1, "price": "45.00" }],
        "total_amount": "45.00"
      }))
      .to_request();
    let placed: Value = test::call_and_read_body_json(&app, req).await;
    let order_id = placed["order"]["id"].as_str().expect("order id").to_string();

    let req = test::TestRequest::get()
      .uri(&format!("/api/orders/{}", order_id))
      .insert_header(bearer(OTHER_MERCHANT_TOKEN))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
      .uri(&format!("/api/orders/{}", order_id))
      .insert_header(bearer(CUSTOMER_TOKEN))
      .set_json(json!({ "status": "confirmed" }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
      .uri("/api/orders")
      .insert_header(bearer(OTHER_MERCHANT_TOKEN))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["orders"].as_array().map(Vec::len), Some(0));

    let req = test::TestRequest::get()
      .uri("/api/orders")
      .insert_header(bearer(MERCHANT_TOKEN))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["orders"].as_array().map(Vec::len), Some(1));
  }

  #[actix_web::test]
  async fn status_payload_needs_a_target() {
    let fx = Fixture::new();
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::put()
      .uri(&format!("/api/orders/{}", uuid::Uuid::new_v4()))
      .insert_header(bearer(MERCHANT_TOKEN))
      .set_json(json!({}))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
  }

  #[actix_web::test]
  async fn anonymous_caller_with_garbled_body_is_unauthenticated() {
    let fx = Fixture::new();
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header(("content-type", "application/json"))
      .set_payload("{ not json")
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
    assert_eq!(fx.gateway.order_count(), 0);
  }

  #[actix_web::test]
  async fn garbled_body_and_bad_ids_answer_with_json_errors() {
    let fx = Fixture::new();
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(fx.state.clone()))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .insert_header(("content-type", "application/json"))
      .set_payload("{ not json")
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().expect("error message");
    assert!(message.starts_with("Invalid request body"), "{}", message);

    let req = test::TestRequest::get()
      .uri("/api/orders/not-a-uuid")
      .insert_header(bearer(MERCHANT_TOKEN))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().expect("error message").starts_with("Invalid path parameter"));

    let req = test::TestRequest::get()
      .uri("/api/nowhere")
      .insert_header(bearer(CUSTOMER_TOKEN))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
  }
}
