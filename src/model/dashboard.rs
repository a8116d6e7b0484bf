use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `GET /dashboard/stats/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_sales_today: Decimal,
    pub total_orders_today: usize,
    pub total_inventory_items: usize,
}
