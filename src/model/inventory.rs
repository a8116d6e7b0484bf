use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Applied when the owner has not configured a threshold of their own.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "In Stock")]
    InStock,
}

impl StockStatus {
    /// Low stock is inclusive: a quantity equal to the threshold is already low.
    pub fn classify(quantity: Decimal, threshold: Decimal) -> Self {
        if quantity <= threshold {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    pub fn is_low(self) -> bool {
        self == Self::LowStock
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub quantity: Decimal,
    pub unit: String,
    pub status: StockStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryItem {
    /// Recompute the status against the owner's threshold.
    pub fn classified(mut self, threshold: Decimal) -> Self {
        self.status = StockStatus::classify(self.quantity, threshold);
        self
    }
}

/// Body of `POST` and `PUT` on `/inventory/items/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryPayload {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: String,
}

impl InventoryPayload {
    pub fn problems(&self) -> Vec<(&'static str, &'static str)> {
        let mut problems = vec![];
        if self.name.trim().is_empty() {
            problems.push(("name", "This field may not be blank."));
        }
        if self.quantity.is_sign_negative() && !self.quantity.is_zero() {
            problems.push(("quantity", "Ensure this value is greater than or equal to 0."));
        }
        problems
    }
}

/// Body of `PATCH /inventory/items/{id}/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
}

impl InventoryPatch {
    pub fn apply(&self, item: &mut InventoryItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = &self.unit {
            item.unit = unit.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryQuery {
    /// case-insensitive substring of name or category
    pub search: Option<String>,
    /// case-insensitive exact category
    pub category: Option<String>,
}

impl InventoryQuery {
    pub fn matches(&self, item: &InventoryItem) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                item.name.to_lowercase().contains(&term)
                    || item.category.to_lowercase().contains(&term)
            }
        };
        let category_ok = match self.category.as_deref() {
            None | Some("") => true,
            Some(category) => item.category.eq_ignore_ascii_case(category),
        };
        search_ok && category_ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_items: usize,
    pub low_stock_items: usize,
    pub categories: usize,
}

impl InventoryStats {
    pub fn from_items(items: &[InventoryItem]) -> Self {
        let categories = items
            .iter()
            .map(|i| i.category.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        Self {
            total_items: items.len(),
            low_stock_items: items.iter().filter(|i| i.status.is_low()).count(),
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(name: &str, category: &str, quantity: &str) -> InventoryItem {
        let threshold = Decimal::from(DEFAULT_LOW_STOCK_THRESHOLD);
        let quantity = Decimal::from_str(quantity).unwrap();
        InventoryItem {
            id: 1,
            name: name.to_string(),
            category: category.to_string(),
            quantity,
            unit: "kg".to_string(),
            status: StockStatus::classify(quantity, threshold),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn low_stock_boundary_is_inclusive() {
        let threshold = Decimal::from(DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(StockStatus::classify(Decimal::from(5), threshold), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(Decimal::from_str("5.001").unwrap(), threshold), StockStatus::InStock);
        assert_eq!(StockStatus::classify(Decimal::ZERO, threshold), StockStatus::LowStock);
    }

    #[test]
    fn status_wire_labels() {
        assert_eq!(serde_json::to_string(&StockStatus::LowStock).unwrap(), "\"Low Stock\"");
        assert_eq!(serde_json::to_string(&StockStatus::InStock).unwrap(), "\"In Stock\"");
    }

    #[test]
    fn reclassify_with_owner_threshold() {
        let cheese = item("Cheese", "Dairy", "8");
        assert!(!cheese.status.is_low());
        assert!(cheese.classified(Decimal::from(10)).status.is_low());
    }

    #[test]
    fn query_matches_name_or_category() {
        let tomatoes = item("Tomatoes", "Vegetables", "50");
        let by_name = InventoryQuery { search: Some("tomat".into()), category: None };
        let by_category = InventoryQuery { search: Some("VEG".into()), category: None };
        let exact = InventoryQuery { search: None, category: Some("vegetables".into()) };
        let miss = InventoryQuery { search: None, category: Some("veg".into()) };
        assert!(by_name.matches(&tomatoes));
        assert!(by_category.matches(&tomatoes));
        assert!(exact.matches(&tomatoes));
        assert!(!miss.matches(&tomatoes));
    }

    #[test]
    fn stats_count_distinct_categories() {
        let items = vec![
            item("Tomatoes", "Vegetables", "50"),
            item("Lettuce", "Vegetables", "3"),
            item("Cheese", "Dairy", "5"),
        ];
        assert_eq!(
            InventoryStats::from_items(&items),
            InventoryStats { total_items: 3, low_stock_items: 2, categories: 2 }
        );
    }
}
