use actix_web::{get, post, web, HttpResponse, Responder};
use log::{info, warn};

use crate::model::order::{CreateOrderRequest, OrderId, OrderListParams, PayOrderRequest, PayOrderResponse};
use crate::server::controller::error::CustomError;
use crate::server::database::{NewOrder, PayOutcome};
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

const DEFAULT_CUSTOMER: &str = "Unknown";

#[get("/api/orders/")]
/// newest first, optionally narrowed by `?status=open|paid`
async fn list_orders(
    params: web::Query<OrderListParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    Ok(web::Json(data.store().list_orders(params.status).await?))
}

#[get("/api/orders/{id}/")]
async fn get_order(id: web::Path<OrderId>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let order = data.store().get_order(id.into_inner()).await?;
    Ok(web::Json(order.ok_or(CustomError::ResourceNotFound)?))
}

#[post("/api/orders/create_order/")]
/// Price every line from the live menu and store the order as open.
async fn create_order(
    body: web::Json<CreateOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let CreateOrderRequest { customer_name, items } = body.into_inner();
    if items.is_empty() {
        return Err(CustomError::bad_request("Items must be a non-empty list."));
    }
    let mut priced = Vec::with_capacity(items.len());
    for line in items {
        let Some(menu_item_id) = line.menu_item_id else {
            return Err(CustomError::bad_request("Each item must have menu_item_id."));
        };
        let quantity = line.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(CustomError::bad_request("Quantity must be a positive integer."));
        }
        let Some(menu_item) = data.store().get_menu_item(menu_item_id).await? else {
            warn!("create_order referenced unknown menu item={}", menu_item_id);
            return Err(CustomError::ResourceNotFound);
        };
        priced.push((menu_item, quantity));
    }
    let customer_name = customer_name.unwrap_or_else(|| DEFAULT_CUSTOMER.to_string());
    let order = data
        .store()
        .create_order(NewOrder::from_menu(customer_name, priced, get_utc_now()))
        .await?;
    info!("created order={} total={}", order.order_number, order.total);
    Ok(HttpResponse::Created().json(order))
}

#[post("/api/pay-order/")]
/// Settle an open order into billing history. Paying twice is rejected.
async fn pay_order(body: web::Json<PayOrderRequest>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let Some(order_id) = body.order_id else {
        return Err(CustomError::bad_request("Order ID is required"));
    };
    match data.store().settle_order(order_id).await? {
        PayOutcome::Paid(billing) => {
            info!("paid order={} billing={}", billing.order_number, billing.id);
            Ok(web::Json(PayOrderResponse {
                message: "Payment successful".to_string(),
                billing_id: billing.id,
                order_number: billing.order_number,
                total_amount: billing.total_amount,
            }))
        }
        PayOutcome::NotFound => Err(CustomError::ResourceNotFound),
        PayOutcome::AlreadyPaid => Err(CustomError::bad_request("Order has already been paid")),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .service(create_order)
        .service(pay_order)
        .service(list_orders)
        .service(get_order);
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::model::menu::MenuItemPayload;
    use crate::model::order::{Order, OrderStatus, PayOrderResponse};
    use crate::server::configure;
    use crate::server::controller::testing::memory_data;
    use crate::server::database::Store;
    use crate::server::util::time::helper::get_utc_now;

    async fn menu_item(store: &dyn Store, name: &str, cents: i64) -> i64 {
        let item = MenuItemPayload { name: name.to_string(), price: Decimal::new(cents, 2), category: "Main".to_string() };
        store.create_menu_item(&item, get_utc_now()).await.unwrap().id
    }

    #[actix_web::test]
    async fn create_then_pay_once() {
        let (store, data) = memory_data();
        let pizza = menu_item(store.as_ref(), "Pizza", 1299).await;
        let soda = menu_item(store.as_ref(), "Soda", 199).await;
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/orders/create_order/")
            .set_json(json!({"customer_name": "Alice", "items": [
                {"menu_item_id": pizza, "quantity": 2},
                {"menu_item_id": soda}
            ]}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let order: Order = test::read_body_json(res).await;
        assert_eq!(order.total, Decimal::new(2797, 2));
        assert_eq!(order.items[1].quantity, 1);
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.order_number, format!("ORD-20240601000000-{}", order.id));

        let pay = || {
            test::TestRequest::post()
                .uri("/api/pay-order/")
                .set_json(json!({"order_id": order.id}))
                .to_request()
        };
        let paid: PayOrderResponse = test::call_and_read_body_json(&app, pay()).await;
        assert_eq!(paid.message, "Payment successful");
        assert_eq!(paid.total_amount, Decimal::new(2797, 2));
        assert_eq!(test::call_service(&app, pay()).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/orders/?status=open").to_request();
        let open: Vec<Order> = test::call_and_read_body_json(&app, req).await;
        assert!(open.is_empty());
        let req = test::TestRequest::get().uri("/api/orders/?status=paid").to_request();
        let paid_orders: Vec<Order> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(paid_orders.len(), 1);
    }

    #[actix_web::test]
    async fn rejects_malformed_orders() {
        let (store, data) = memory_data();
        let pizza = menu_item(store.as_ref(), "Pizza", 1299).await;
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        for (body, status) in [
            (json!({"items": []}), StatusCode::BAD_REQUEST),
            (json!({"customer_name": "Bob"}), StatusCode::BAD_REQUEST),
            (json!({"items": [{"quantity": 2}]}), StatusCode::BAD_REQUEST),
            (json!({"items": [{"menu_item_id": pizza, "quantity": 0}]}), StatusCode::BAD_REQUEST),
            (json!({"items": [{"menu_item_id": 999}]}), StatusCode::NOT_FOUND),
        ] {
            let req = test::TestRequest::post().uri("/api/orders/create_order/").set_json(&body).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), status, "body={body}");
        }
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn pay_requires_known_order() {
        let (_, data) = memory_data();
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;
        let req = test::TestRequest::post().uri("/api/pay-order/").set_json(json!({})).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "Order ID is required");

        let req = test::TestRequest::post().uri("/api/pay-order/").set_json(json!({"order_id": 5})).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
