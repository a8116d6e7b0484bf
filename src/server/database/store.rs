use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::model::billing::{BillingLine, BillingRecord};
use crate::model::inventory::{InventoryItem, InventoryPatch, InventoryPayload};
use crate::model::menu::{MenuItem, MenuItemId, MenuItemPayload};
use crate::model::order::{Order, OrderId, OrderStatus};
use crate::model::user::{
    avatar_initials, UpdateProfileRequest, UpdateSettingsRequest, User, UserId, UserSettings,
};
use crate::server::database::StoreError;

/// An order about to be written, priced from the live menu.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub order_date: DateTime<Utc>,
    pub total: Decimal,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLine {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub category: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

impl NewOrder {
    pub fn from_menu(customer_name: String, items: Vec<(MenuItem, i32)>, order_date: DateTime<Utc>) -> Self {
        let lines = items
            .into_iter()
            .map(|(item, quantity)| NewOrderLine {
                menu_item_id: item.id,
                subtotal: item.price * Decimal::from(quantity),
                price: item.price,
                quantity,
                name: item.name,
                category: item.category,
            })
            .collect::<Vec<_>>();
        Self {
            customer_name,
            order_date,
            total: lines.iter().map(|l| l.subtotal).sum(),
            lines,
        }
    }
}

/// Billing row written when an order is paid.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBilling {
    pub order_number: String,
    pub customer_name: String,
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub items_summary: String,
}

impl NewBilling {
    /// Snapshot the order lines so the record survives menu edits.
    pub fn for_order(order: &Order) -> Self {
        let lines = order
            .items
            .iter()
            .map(|line| BillingLine {
                name: Some(line.menu_item_name.clone()),
                category: Some(line.menu_item_category.clone()),
                quantity: i64::from(line.quantity),
                price: Some(line.price),
                subtotal: line.subtotal,
            })
            .collect::<Vec<_>>();
        Self {
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            total_amount: order.total,
            order_date: order.order_date,
            items_summary: serde_json::to_string(&lines).unwrap_or_else(|_| "[]".to_string()),
        }
    }
}

#[derive(Debug)]
pub enum PayOutcome {
    Paid(BillingRecord),
    NotFound,
    AlreadyPaid,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub restaurant_name: String,
}

/// What login needs to check a password.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: UserId,
    pub password_hash: String,
    pub is_active: bool,
}

/// Profile edits applied to a loaded user. Initials follow name changes.
pub fn apply_profile_update(user: &mut User, req: &UpdateProfileRequest) {
    if let Some(first_name) = &req.first_name {
        user.first_name = first_name.clone();
    }
    if let Some(last_name) = &req.last_name {
        user.last_name = last_name.clone();
    }
    if let Some(email) = &req.email {
        user.email = email.clone();
    }
    let profile = &mut user.profile;
    if let Some(v) = &req.restaurant_name {
        profile.restaurant_name = v.clone();
    }
    if let Some(v) = &req.phone {
        profile.phone = v.clone();
    }
    if let Some(v) = &req.theme {
        profile.theme = v.clone();
    }
    if let Some(v) = &req.currency {
        profile.currency = v.clone();
    }
    if let Some(v) = &req.language {
        profile.language = v.clone();
    }
    if let Some(v) = req.notifications_enabled {
        profile.notifications_enabled = v;
    }
    if let Some(v) = req.low_stock_threshold {
        profile.low_stock_threshold = v;
    }
    if let Some(v) = &req.ai_model {
        profile.ai_model = v.clone();
    }
    if let Some(v) = &req.gemini_api_key {
        profile.ai_api_key = v.clone();
        profile.has_ai_key = !v.is_empty();
    }
    if req.first_name.is_some() || req.last_name.is_some() {
        profile.avatar_initials = avatar_initials(&user.username, &user.first_name, &user.last_name);
    }
}

pub fn apply_settings_update(settings: &mut UserSettings, req: &UpdateSettingsRequest) {
    if let Some(v) = &req.restaurant_address {
        settings.restaurant_address = v.clone();
    }
    if let Some(v) = &req.restaurant_phone {
        settings.restaurant_phone = v.clone();
    }
    if let Some(v) = &req.restaurant_email {
        settings.restaurant_email = v.clone();
    }
    if let Some(v) = &req.business_hours {
        settings.business_hours = v.clone();
    }
    if let Some(v) = req.tax_rate {
        settings.tax_rate = v;
    }
    if let Some(v) = req.default_tip_percentage {
        settings.default_tip_percentage = v;
    }
    if let Some(v) = &req.receipt_footer {
        settings.receipt_footer = v.clone();
    }
}

/// Everything the controllers read and write. Inventory is scoped to its owner.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_menu(&self) -> Result<Vec<MenuItem>, StoreError>;
    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, StoreError>;
    async fn create_menu_item(&self, item: &MenuItemPayload, now: DateTime<Utc>) -> Result<MenuItem, StoreError>;
    async fn update_menu_item(&self, id: MenuItemId, item: &MenuItemPayload) -> Result<Option<MenuItem>, StoreError>;
    async fn delete_menu_item(&self, id: MenuItemId) -> Result<bool, StoreError>;

    /// Newest first.
    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;
    /// Flip an open order to paid and record its billing row, atomically.
    async fn settle_order(&self, id: OrderId) -> Result<PayOutcome, StoreError>;
    async fn count_orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(usize, Decimal), StoreError>;

    /// Newest first.
    async fn list_billing(&self) -> Result<Vec<BillingRecord>, StoreError>;
    async fn get_billing(&self, id: i64) -> Result<Option<BillingRecord>, StoreError>;

    async fn list_inventory(&self, owner: UserId) -> Result<Vec<InventoryItem>, StoreError>;
    async fn get_inventory_item(&self, owner: UserId, id: i64) -> Result<Option<InventoryItem>, StoreError>;
    async fn create_inventory_item(
        &self,
        owner: UserId,
        item: &InventoryPayload,
        now: DateTime<Utc>,
    ) -> Result<InventoryItem, StoreError>;
    async fn update_inventory_item(
        &self,
        owner: UserId,
        id: i64,
        patch: &InventoryPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryItem>, StoreError>;
    async fn delete_inventory_item(&self, owner: UserId, id: i64) -> Result<bool, StoreError>;
    /// Across every owner.
    async fn count_inventory(&self) -> Result<usize, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    /// Lookup by username, falling back to email.
    async fn find_credentials(&self, login: &str) -> Result<Option<Credentials>, StoreError>;
    async fn username_taken(&self, username: &str) -> Result<bool, StoreError>;
    async fn email_taken(&self, email: &str, except: Option<UserId>) -> Result<bool, StoreError>;
    async fn update_profile(&self, id: UserId, req: &UpdateProfileRequest) -> Result<Option<User>, StoreError>;
    async fn update_settings(
        &self,
        id: UserId,
        req: &UpdateSettingsRequest,
    ) -> Result<Option<UserSettings>, StoreError>;
    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), StoreError>;

    async fn user_for_token(&self, token: &str) -> Result<Option<User>, StoreError>;
    /// The user's existing token, or `fresh` once stored.
    async fn token_for(&self, id: UserId, fresh: &str) -> Result<String, StoreError>;
    /// Drop every token of the user and store `fresh` as the only one.
    async fn replace_token(&self, id: UserId, fresh: &str) -> Result<(), StoreError>;
    async fn revoke_tokens(&self, id: UserId) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::OrderLine;
    use crate::model::user::{UserProfile, UserSettings};

    fn menu_item(id: i64, name: &str, price: i64) -> MenuItem {
        MenuItem {
            id,
            name: name.to_string(),
            price: Decimal::new(price, 2),
            category: "Main".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn new_order_prices_lines_from_menu() {
        let now = DateTime::<Utc>::from_timestamp(1_717_200_000, 0).unwrap();
        let order = NewOrder::from_menu(
            "Alice".to_string(),
            vec![(menu_item(1, "Pizza", 1299), 2), (menu_item(2, "Soda", 199), 3)],
            now,
        );
        assert_eq!(order.lines[0].subtotal, Decimal::new(2598, 2));
        assert_eq!(order.lines[1].subtotal, Decimal::new(597, 2));
        assert_eq!(order.total, Decimal::new(3195, 2));
    }

    #[test]
    fn billing_snapshot_carries_names() {
        let order = Order {
            id: 3,
            customer_name: "Bob".to_string(),
            order_number: "ORD-20240601000000-3".to_string(),
            order_date: DateTime::<Utc>::from_timestamp(1_717_200_000, 0).unwrap(),
            total: Decimal::new(1000, 2),
            status: OrderStatus::Open,
            items: vec![OrderLine {
                id: 1,
                menu_item: Some(9),
                menu_item_name: "Pasta".to_string(),
                menu_item_category: "Main".to_string(),
                quantity: 1,
                price: Decimal::new(1000, 2),
                subtotal: Decimal::new(1000, 2),
            }],
        };
        let billing = NewBilling::for_order(&order);
        let record = BillingRecord {
            id: 1,
            order_number: billing.order_number.clone(),
            customer_name: billing.customer_name.clone(),
            total_amount: billing.total_amount,
            order_date: Some(billing.order_date),
            items_summary: billing.items_summary.clone(),
            status: crate::model::billing::PAID_STATUS.to_string(),
        };
        let lines = record.items().unwrap();
        assert_eq!(lines[0].name.as_deref(), Some("Pasta"));
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[0].subtotal, Decimal::new(1000, 2));
    }

    #[test]
    fn profile_update_refreshes_initials_and_key_flag() {
        let mut user = User {
            id: 1,
            username: "jdoe".to_string(),
            email: "j@doe.io".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            profile: UserProfile::default(),
            app_settings: UserSettings::default(),
        };
        apply_profile_update(
            &mut user,
            &UpdateProfileRequest {
                first_name: Some("jane".to_string()),
                last_name: Some("doe".to_string()),
                gemini_api_key: Some("k-123".to_string()),
                ..UpdateProfileRequest::default()
            },
        );
        assert_eq!(user.profile.avatar_initials, "JD");
        assert!(user.profile.has_ai_key);

        apply_profile_update(
            &mut user,
            &UpdateProfileRequest { gemini_api_key: Some(String::new()), ..UpdateProfileRequest::default() },
        );
        assert!(!user.profile.has_ai_key);
        assert_eq!(user.profile.avatar_initials, "JD");
    }
}
