use actix_web::{get, web, Responder};
use chrono::{Duration, NaiveTime};

use crate::model::dashboard::DashboardStats;
use crate::server::controller::error::CustomError;
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

#[get("/dashboard/stats/")]
/// Today's orders (any status) and the overall inventory size.
async fn dashboard_stats(data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let start = get_utc_now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let store = data.store();
    let ((total_orders_today, total_sales_today), total_inventory_items) = tokio::try_join!(
        store.count_orders_between(start, start + Duration::days(1)),
        store.count_inventory(),
    )?;
    Ok(web::Json(DashboardStats {
        total_sales_today: total_sales_today.round_dp(2),
        total_orders_today,
        total_inventory_items,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .service(dashboard_stats);
}
