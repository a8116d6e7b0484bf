use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

pub const PAID_STATUS: &str = "Paid";

/// A paid order kept as a historical snapshot. Purchased items are held as a JSON
/// string rather than live menu references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: i64,
    pub order_number: String,
    pub customer_name: String,
    pub total_amount: Decimal,
    pub order_date: Option<DateTime<Utc>>,
    pub items_summary: String,
    pub status: String,
}

impl BillingRecord {
    /// Decode the purchased-items snapshot.
    pub fn items(&self) -> Result<Vec<BillingLine>, serde_json::Error> {
        serde_json::from_str(&self.items_summary)
    }
}

/// One entry of a billing snapshot. Every field is optional on the wire; older
/// snapshots lack `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingLine {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub subtotal: Decimal,
}

/// Accept integers, floats or numeric strings, truncating like an integer parse.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.trunc() as i64)
            .unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingItemsResponse {
    pub items: Vec<BillingLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(summary: &str) -> BillingRecord {
        BillingRecord {
            id: 1,
            order_number: "ORD-1".to_string(),
            customer_name: "Alice".to_string(),
            total_amount: Decimal::new(1500, 2),
            order_date: None,
            items_summary: summary.to_string(),
            status: PAID_STATUS.to_string(),
        }
    }

    #[test]
    fn decodes_loose_snapshot() {
        let items = record(r#"[{"name":"A","quantity":"3","subtotal":15.0},{"quantity":1.9}]"#)
            .items()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name.as_deref(), Some("A"));
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].subtotal, Decimal::from(15));
        assert_eq!(items[1].name, None);
        assert_eq!(items[1].quantity, 1);
        assert_eq!(items[1].subtotal, Decimal::ZERO);
    }

    #[test]
    fn rejects_garbage_snapshot() {
        assert!(record("not json").items().is_err());
    }
}
