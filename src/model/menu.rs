use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type MenuItemId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/menu-items/` and `PUT /api/menu-items/{id}/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemPayload {
    pub name: String,
    pub price: Decimal,
    pub category: String,
}

impl MenuItemPayload {
    /// Field errors, empty when the payload is acceptable.
    pub fn problems(&self) -> Vec<(&'static str, &'static str)> {
        let mut problems = vec![];
        if self.name.trim().is_empty() {
            problems.push(("name", "This field may not be blank."));
        }
        if self.category.trim().is_empty() {
            problems.push(("category", "This field may not be blank."));
        }
        if self.price.is_sign_negative() {
            problems.push(("price", "Ensure this value is greater than or equal to 0."));
        }
        problems
    }
}
