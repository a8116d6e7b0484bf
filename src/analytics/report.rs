//! Data snapshots handed to the reports, forecasting and insights pages.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::daily::{daily_sales_sparse, DailySales, DateRange};
use crate::analytics::sales::{merge_by_name, top_items, ItemSales, MenuIndex, SaleRecord};
use crate::model::billing::BillingRecord;
use crate::model::inventory::{InventoryItem, StockStatus};
use crate::model::menu::MenuItem;
use crate::model::order::Order;

const TOP_ITEMS: usize = 10;
const INVENTORY_CATEGORY: &str = "Inventory";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopItem {
    pub name: String,
    pub category: String,
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub name: String,
    pub category: String,
    pub quantity: Decimal,
    pub unit: String,
    pub status: StockStatus,
}

impl From<&InventoryItem> for InventorySnapshot {
    fn from(item: &InventoryItem) -> Self {
        Self {
            name: item.name.clone(),
            category: item.category.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            status: item.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub range: String,
    pub total_orders: usize,
    pub total_sales: Decimal,
    pub top_items: Vec<TopItem>,
    pub daily_sales: Vec<DailySales>,
    pub low_stock: Vec<InventorySnapshot>,
}

/// Metrics over the records that fall inside `range`.
pub fn report_metrics(
    records: &[SaleRecord],
    inventory: &[InventoryItem],
    range: DateRange,
    now: DateTime<Utc>,
) -> ReportMetrics {
    let filtered = records
        .iter()
        .filter(|r| range.includes(r.order_date, now))
        .collect::<Vec<_>>();
    let total_sales = filtered.iter().map(|r| r.total).sum::<Decimal>().round_dp(2);
    let by_name = merge_by_name(filtered.iter().copied());
    ReportMetrics {
        range: range.to_string(),
        total_orders: filtered.len(),
        total_sales,
        top_items: top_items(&by_name, TOP_ITEMS)
            .into_iter()
            .map(|i| TopItem { name: i.name, category: i.category, qty: i.quantity_sold })
            .collect(),
        daily_sales: daily_sales_sparse(filtered.iter().copied()),
        low_stock: inventory
            .iter()
            .filter(|i| i.status.is_low())
            .map(InventorySnapshot::from)
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub name: String,
    pub category: String,
    pub sold_last_period: i64,
    pub current_stock: Option<Decimal>,
}

/// Every sold item with its stock level, then stocked items that never sold.
pub fn forecast_inputs(
    sales: &BTreeMap<String, ItemSales>,
    menu: &[MenuItem],
    inventory: &[InventoryItem],
) -> Vec<ForecastInput> {
    let menu = MenuIndex::new(menu);
    let stock = inventory
        .iter()
        .map(|i| (i.name.to_lowercase(), i))
        .collect::<HashMap<_, _>>();
    let mut rows = sales
        .values()
        .map(|s| ForecastInput {
            name: s.name.clone(),
            category: menu
                .by_name(&s.name)
                .map(|m| m.category.clone())
                .unwrap_or_else(|| crate::model::DEFAULT_CATEGORY.to_string()),
            sold_last_period: s.quantity_sold,
            current_stock: stock.get(&s.name.to_lowercase()).map(|i| i.quantity),
        })
        .collect::<Vec<_>>();
    rows.extend(inventory.iter().filter(|i| !sales.contains_key(&i.name)).map(|i| ForecastInput {
        name: i.name.clone(),
        category: Some(i.category.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| INVENTORY_CATEGORY.to_string()),
        sold_last_period: 0,
        current_stock: Some(i.quantity),
    }));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuSnapshot {
    pub name: String,
    pub price: Decimal,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsPayload {
    pub sales_summary: Vec<ItemSales>,
    pub inventory: Vec<InventorySnapshot>,
    pub menu_items: Vec<MenuSnapshot>,
    pub total_orders: usize,
    pub total_revenue: Decimal,
}

pub fn insights_payload(
    sales: &BTreeMap<String, ItemSales>,
    orders: &[Order],
    billing: &[BillingRecord],
    menu: &[MenuItem],
    inventory: &[InventoryItem],
) -> InsightsPayload {
    InsightsPayload {
        sales_summary: sales.values().cloned().collect(),
        inventory: inventory.iter().map(InventorySnapshot::from).collect(),
        menu_items: menu
            .iter()
            .map(|m| MenuSnapshot { name: m.name.clone(), price: m.price, category: m.category.clone() })
            .collect(),
        total_orders: orders.iter().filter(|o| o.is_open()).count() + billing.len(),
        total_revenue: billing.iter().map(|b| b.total_amount).sum(),
    }
}
