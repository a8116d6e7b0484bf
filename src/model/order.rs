use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::model::menu::MenuItemId;

pub type OrderId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[display("open")]
    Open,
    #[display("paid")]
    Paid,
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "paid" => Ok(Self::Paid),
            s => Err(format!("Invalid order status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
}

impl Order {
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }
}

/// A line of an order. The menu reference is cleared when the menu item is deleted,
/// the captured name and category stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub menu_item: Option<MenuItemId>,
    pub menu_item_name: String,
    pub menu_item_category: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

/// Body of `POST /api/orders/create_order/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<CreateOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderLine {
    pub menu_item_id: Option<MenuItemId>,
    pub quantity: Option<i32>,
}

/// Body of `POST /api/pay-order/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayOrderRequest {
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayOrderResponse {
    pub message: String,
    pub billing_id: i64,
    pub order_number: String,
    pub total_amount: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
    pub status: Option<OrderStatus>,
}

/// Order numbers embed the order id so two orders placed within the same second stay unique.
pub fn order_number(order_date: DateTime<Utc>, id: OrderId) -> String {
    format!("ORD-{}-{}", order_date.format("%Y%m%d%H%M%S"), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_format() {
        let date = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(order_number(date, 42), "ORD-20231114221320-42");
    }

    #[test]
    fn status_parses_lowercase_only() {
        assert_eq!("open".parse::<OrderStatus>(), Ok(OrderStatus::Open));
        assert_eq!("paid".parse::<OrderStatus>(), Ok(OrderStatus::Paid));
        assert!("Paid".parse::<OrderStatus>().is_err());
    }
}
