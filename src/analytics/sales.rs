use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::billing::BillingRecord;
use crate::model::menu::{MenuItem, MenuItemId};
use crate::model::order::{Order, OrderLine};
use crate::model::DEFAULT_CATEGORY;

const UNKNOWN_ITEM: &str = "Unknown";

/// Accumulated sales of one item, keyed by item name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSales {
    pub name: String,
    pub category: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
}

/// One sold line, already resolved to a name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoldLine {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

/// An open order or a billing record reduced to what the reports need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    pub order_date: Option<DateTime<Utc>>,
    pub total: Decimal,
    pub items: Vec<SoldLine>,
}

/// Lookups into the live menu.
pub struct MenuIndex<'a> {
    by_id: HashMap<MenuItemId, &'a MenuItem>,
    by_name: HashMap<String, &'a MenuItem>,
}

impl<'a> MenuIndex<'a> {
    pub fn new(menu: &'a [MenuItem]) -> Self {
        Self {
            by_id: menu.iter().map(|m| (m.id, m)).collect(),
            by_name: menu.iter().map(|m| (m.name.to_lowercase(), m)).collect(),
        }
    }

    pub fn by_id(&self, id: MenuItemId) -> Option<&'a MenuItem> {
        self.by_id.get(&id).copied()
    }

    /// case-insensitive
    pub fn by_name(&self, name: &str) -> Option<&'a MenuItem> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    fn resolve_order_line(&self, line: &OrderLine) -> SoldLine {
        let live = line.menu_item.and_then(|id| self.by_id(id));
        let name = match (live, line.menu_item_name.is_empty(), line.menu_item) {
            (Some(item), _, _) => item.name.clone(),
            (None, false, _) => line.menu_item_name.clone(),
            (None, true, Some(id)) => format!("Item {id}"),
            (None, true, None) => UNKNOWN_ITEM.to_string(),
        };
        let category = live
            .map(|item| item.category.clone())
            .or_else(|| Some(line.menu_item_category.clone()).filter(|c| !c.is_empty()))
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        SoldLine {
            name,
            category,
            quantity: i64::from(line.quantity),
            revenue: line.subtotal,
        }
    }
}

/// Open orders only: a paid order is represented by its billing record.
fn open_records(orders: &[Order], menu: &MenuIndex<'_>) -> Vec<SaleRecord> {
    orders
        .iter()
        .filter(|o| o.is_open())
        .map(|o| SaleRecord {
            order_date: Some(o.order_date),
            total: o.total,
            items: o.items.iter().map(|line| menu.resolve_order_line(line)).collect(),
        })
        .collect()
}

fn billing_record(record: &BillingRecord, menu: &MenuIndex<'_>) -> SaleRecord {
    let items = match record.items() {
        Ok(lines) => lines
            .into_iter()
            .map(|line| {
                let name = line
                    .name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| UNKNOWN_ITEM.to_string());
                let category = menu
                    .by_name(&name)
                    .map(|item| item.category.clone())
                    .or(line.category.filter(|c| !c.is_empty()))
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
                SoldLine {
                    name,
                    category,
                    quantity: line.quantity,
                    revenue: line.subtotal,
                }
            })
            .collect(),
        Err(e) => {
            debug!("skipping items of billing record={}, {}", record.id, e);
            vec![]
        }
    };
    SaleRecord {
        order_date: record.order_date,
        total: record.total_amount,
        items,
    }
}

/// Open orders followed by paid billing records, in one shape.
pub fn sale_records(orders: &[Order], billing: &[BillingRecord], menu: &[MenuItem]) -> Vec<SaleRecord> {
    let index = MenuIndex::new(menu);
    let mut records = open_records(orders, &index);
    records.extend(billing.iter().map(|b| billing_record(b, &index)));
    records
}

/// Merge sold lines by item name. The first sighting of a name fixes its category.
pub fn merge_by_name<'a>(records: impl IntoIterator<Item = &'a SaleRecord>) -> BTreeMap<String, ItemSales> {
    let mut merged: BTreeMap<String, ItemSales> = BTreeMap::new();
    for line in records.into_iter().flat_map(|r| r.items.iter()) {
        let entry = merged.entry(line.name.clone()).or_insert_with(|| ItemSales {
            name: line.name.clone(),
            category: line.category.clone(),
            quantity_sold: 0,
            revenue: Decimal::ZERO,
        });
        entry.quantity_sold += line.quantity;
        entry.revenue += line.revenue;
    }
    merged
}

/// Per-item sales across open orders and paid billing records. Billing snapshots
/// whose summary does not parse contribute nothing.
pub fn aggregate_sales(
    orders: &[Order],
    billing: &[BillingRecord],
    menu: &[MenuItem],
) -> BTreeMap<String, ItemSales> {
    merge_by_name(&sale_records(orders, billing, menu))
}

/// Best sellers by quantity, ties broken by name.
pub fn top_items(sales: &BTreeMap<String, ItemSales>, limit: usize) -> Vec<ItemSales> {
    let mut items = sales.values().cloned().collect::<Vec<_>>();
    items.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold).then_with(|| a.name.cmp(&b.name)));
    items.truncate(limit);
    items
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::billing::PAID_STATUS;
    use crate::model::order::OrderStatus;

    pub(crate) fn menu() -> Vec<MenuItem> {
        vec![
            MenuItem {
                id: 1,
                name: "A".to_string(),
                price: Decimal::from(5),
                category: "Burgers".to_string(),
                created_at: None,
            },
            MenuItem {
                id: 2,
                name: "Soda".to_string(),
                price: Decimal::new(199, 2),
                category: "Drinks".to_string(),
                created_at: None,
            },
        ]
    }

    pub(crate) fn order(id: i64, date: DateTime<Utc>, lines: &[(i64, i32, Decimal)], status: OrderStatus) -> Order {
        let items = lines
            .iter()
            .enumerate()
            .map(|(i, (menu_item, quantity, subtotal))| OrderLine {
                id: i as i64,
                menu_item: Some(*menu_item),
                menu_item_name: String::new(),
                menu_item_category: String::new(),
                quantity: *quantity,
                price: *subtotal / Decimal::from(*quantity),
                subtotal: *subtotal,
            })
            .collect::<Vec<_>>();
        Order {
            id,
            customer_name: "Alice".to_string(),
            order_number: format!("ORD-{id}"),
            order_date: date,
            total: items.iter().map(|l| l.subtotal).sum(),
            status,
            items,
        }
    }

    pub(crate) fn billing(id: i64, date: Option<DateTime<Utc>>, summary: &str, total: Decimal) -> BillingRecord {
        BillingRecord {
            id,
            order_number: format!("ORD-{id}"),
            customer_name: "Bob".to_string(),
            total_amount: total,
            order_date: date,
            items_summary: summary.to_string(),
            status: PAID_STATUS.to_string(),
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    #[test]
    fn merges_orders_and_billing_by_name() {
        let orders = vec![order(1, at(0), &[(1, 2, Decimal::from(10))], OrderStatus::Open)];
        let billing = vec![billing(
            7,
            Some(at(0)),
            r#"[{"name":"A","quantity":3,"subtotal":15}]"#,
            Decimal::from(15),
        )];
        let sales = aggregate_sales(&orders, &billing, &menu());
        let a = &sales["A"];
        assert_eq!(a.quantity_sold, 5);
        assert_eq!(a.revenue, Decimal::from(25));
        assert_eq!(a.category, "Burgers");
        assert_eq!(sales.len(), 1);
    }

    #[test]
    fn unparseable_summary_is_skipped() {
        let billing = vec![
            billing(1, None, "{{broken", Decimal::from(3)),
            billing(2, None, r#"[{"name":"Soda","quantity":2,"subtotal":3.98}]"#, Decimal::new(398, 2)),
        ];
        let sales = aggregate_sales(&[], &billing, &menu());
        assert_eq!(sales.len(), 1);
        assert_eq!(sales["Soda"].quantity_sold, 2);
        assert_eq!(sales["Soda"].revenue, Decimal::new(398, 2));
    }

    #[test]
    fn paid_orders_are_not_counted_twice() {
        let orders = vec![order(1, at(0), &[(1, 2, Decimal::from(10))], OrderStatus::Paid)];
        let billing = vec![billing(
            1,
            Some(at(0)),
            r#"[{"name":"A","quantity":2,"subtotal":10}]"#,
            Decimal::from(10),
        )];
        let sales = aggregate_sales(&orders, &billing, &menu());
        assert_eq!(sales["A"].quantity_sold, 2);
    }

    #[test]
    fn category_falls_back_to_snapshot_then_default() {
        let billing = vec![billing(
            1,
            None,
            r#"[{"name":"Gelato","category":"Desserts","quantity":1,"subtotal":4},{"quantity":1,"subtotal":2}]"#,
            Decimal::from(6),
        )];
        let sales = aggregate_sales(&[], &billing, &menu());
        assert_eq!(sales["Gelato"].category, "Desserts");
        assert_eq!(sales["Unknown"].category, DEFAULT_CATEGORY);
    }

    #[test]
    fn deleted_menu_item_uses_captured_name() {
        let mut orphan = order(1, at(0), &[(99, 1, Decimal::from(7))], OrderStatus::Open);
        orphan.items[0].menu_item = None;
        orphan.items[0].menu_item_name = "Old Special".to_string();
        let mut unnamed = order(2, at(0), &[(98, 1, Decimal::from(1))], OrderStatus::Open);
        unnamed.items[0].menu_item_name = String::new();
        let sales = aggregate_sales(&[orphan, unnamed], &[], &menu());
        assert_eq!(sales["Old Special"].quantity_sold, 1);
        assert_eq!(sales["Item 98"].category, DEFAULT_CATEGORY);
    }

    #[test]
    fn top_items_sorted_by_quantity() {
        let billing = vec![billing(
            1,
            None,
            r#"[{"name":"A","quantity":1,"subtotal":5},{"name":"Soda","quantity":4,"subtotal":8},{"name":"B","quantity":1,"subtotal":1}]"#,
            Decimal::from(14),
        )];
        let sales = aggregate_sales(&[], &billing, &menu());
        let top = top_items(&sales, 2);
        assert_eq!(top.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), vec!["Soda", "A"]);
    }
}
