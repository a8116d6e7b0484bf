use actix_web::{get, web, Responder};
use log::debug;

use crate::model::billing::BillingItemsResponse;
use crate::server::controller::error::CustomError;
use crate::server::state::AppState;

#[get("/api/billing-history/")]
async fn list_billing(data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    Ok(web::Json(data.store().list_billing().await?))
}

#[get("/api/billing-history/{id}/")]
async fn get_billing(id: web::Path<i64>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let record = data.store().get_billing(id.into_inner()).await?;
    Ok(web::Json(record.ok_or(CustomError::ResourceNotFound)?))
}

#[get("/api/billing-history/{id}/items/")]
/// the line snapshot of one billing record, empty when it cannot be read
async fn get_billing_items(id: web::Path<i64>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let record = data
        .store()
        .get_billing(id.into_inner())
        .await?
        .ok_or(CustomError::ResourceNotFound)?;
    let items = record.items().unwrap_or_else(|e| {
        debug!("unreadable items_summary on billing={}, {}", record.id, e);
        vec![]
    });
    Ok(web::Json(BillingItemsResponse { items }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .service(list_billing)
        .service(get_billing_items)
        .service(get_billing);
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use rust_decimal::Decimal;

    use crate::model::billing::{BillingItemsResponse, BillingRecord};
    use crate::model::menu::MenuItemPayload;
    use crate::server::configure;
    use crate::server::controller::testing::memory_data;
    use crate::server::database::{NewOrder, PayOutcome, Store};
    use crate::server::util::time::helper::get_utc_now;

    #[actix_web::test]
    async fn paid_order_shows_up_with_items() {
        let (store, data) = memory_data();
        let item = MenuItemPayload { name: "Pasta".to_string(), price: Decimal::new(1099, 2), category: "Main".to_string() };
        let pasta = store.create_menu_item(&item, get_utc_now()).await.unwrap();
        let order = store
            .create_order(NewOrder::from_menu("Carol".to_string(), vec![(pasta, 2)], get_utc_now()))
            .await
            .unwrap();
        let PayOutcome::Paid(billing) = store.settle_order(order.id).await.unwrap() else {
            panic!("order should be payable");
        };
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/billing-history/").to_request();
        let all: Vec<BillingRecord> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, "Paid");

        let req = test::TestRequest::get().uri(&format!("/api/billing-history/{}/items/", billing.id)).to_request();
        let items: BillingItemsResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(items.items.len(), 1);
        assert_eq!(items.items[0].name.as_deref(), Some("Pasta"));
        assert_eq!(items.items[0].quantity, 2);
        assert_eq!(items.items[0].subtotal, Decimal::new(2198, 2));

        let req = test::TestRequest::get().uri("/api/billing-history/99/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
