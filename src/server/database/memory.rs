//! Process-local store, used by tests and `STORE=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::model::billing::{BillingRecord, PAID_STATUS};
use crate::model::inventory::{InventoryItem, InventoryPatch, InventoryPayload, StockStatus, DEFAULT_LOW_STOCK_THRESHOLD};
use crate::model::menu::{MenuItem, MenuItemId, MenuItemPayload};
use crate::model::order::{order_number, Order, OrderId, OrderLine, OrderStatus};
use crate::model::user::{
    avatar_initials, UpdateProfileRequest, UpdateSettingsRequest, User, UserId, UserProfile, UserSettings,
};
use crate::server::database::store::{apply_profile_update, apply_settings_update};
use crate::server::database::{Credentials, NewBilling, NewOrder, NewUser, PayOutcome, Store, StoreError};

struct UserRow {
    user: User,
    password_hash: String,
    is_active: bool,
}

#[derive(Default)]
struct Tables {
    sequences: HashMap<&'static str, i64>,
    menu: Vec<MenuItem>,
    orders: Vec<Order>,
    billing: Vec<BillingRecord>,
    inventory: Vec<(UserId, InventoryItem)>,
    users: Vec<UserRow>,
    tokens: HashMap<String, UserId>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn user_mut(&mut self, id: UserId) -> Option<&mut UserRow> {
        self.users.iter_mut().find(|row| row.user.id == id)
    }
}

fn newest_first<T>(mut rows: Vec<T>, date: impl Fn(&T) -> Option<DateTime<Utc>>) -> Vec<T> {
    rows.sort_by(|a, b| date(b).cmp(&date(a)));
    rows
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_menu(&self) -> Result<Vec<MenuItem>, StoreError> {
        Ok(self.tables.read().await.menu.clone())
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, StoreError> {
        Ok(self.tables.read().await.menu.iter().find(|m| m.id == id).cloned())
    }

    async fn create_menu_item(&self, item: &MenuItemPayload, now: DateTime<Utc>) -> Result<MenuItem, StoreError> {
        let mut tables = self.tables.write().await;
        let created = MenuItem {
            id: tables.next_id("menu_item"),
            name: item.name.clone(),
            price: item.price.round_dp(2),
            category: item.category.clone(),
            created_at: Some(now),
        };
        tables.menu.push(created.clone());
        Ok(created)
    }

    async fn update_menu_item(&self, id: MenuItemId, item: &MenuItemPayload) -> Result<Option<MenuItem>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.menu.iter_mut().find(|m| m.id == id).map(|m| {
            m.name = item.name.clone();
            m.price = item.price.round_dp(2);
            m.category = item.category.clone();
            m.clone()
        }))
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.menu.len();
        tables.menu.retain(|m| m.id != id);
        if tables.menu.len() == before {
            return Ok(false);
        }
        // order lines keep their captured name
        for line in tables.orders.iter_mut().flat_map(|o| o.items.iter_mut()) {
            if line.menu_item == Some(id) {
                line.menu_item = None;
            }
        }
        Ok(true)
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let orders = self
            .tables
            .read()
            .await
            .orders
            .iter()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| Some(o.order_date)))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id("customer_order");
        let mut items = Vec::with_capacity(order.lines.len());
        for line in order.lines {
            items.push(OrderLine {
                id: tables.next_id("order_item"),
                menu_item: Some(line.menu_item_id),
                menu_item_name: line.name,
                menu_item_category: line.category,
                quantity: line.quantity,
                price: line.price,
                subtotal: line.subtotal,
            });
        }
        let created = Order {
            id,
            customer_name: order.customer_name,
            order_number: order_number(order.order_date, id),
            order_date: order.order_date,
            total: order.total,
            status: OrderStatus::Open,
            items,
        };
        tables.orders.push(created.clone());
        Ok(created)
    }

    async fn settle_order(&self, id: OrderId) -> Result<PayOutcome, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.iter_mut().find(|o| o.id == id) else {
            return Ok(PayOutcome::NotFound);
        };
        if !order.is_open() {
            return Ok(PayOutcome::AlreadyPaid);
        }
        order.status = OrderStatus::Paid;
        let billing = NewBilling::for_order(order);
        let record = BillingRecord {
            id: tables.next_id("billing_history"),
            order_number: billing.order_number,
            customer_name: billing.customer_name,
            total_amount: billing.total_amount,
            order_date: Some(billing.order_date),
            items_summary: billing.items_summary,
            status: PAID_STATUS.to_string(),
        };
        tables.billing.push(record.clone());
        Ok(PayOutcome::Paid(record))
    }

    async fn count_orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(usize, Decimal), StoreError> {
        let tables = self.tables.read().await;
        let today = tables
            .orders
            .iter()
            .filter(|o| o.order_date >= from && o.order_date < to)
            .collect::<Vec<_>>();
        Ok((today.len(), today.iter().map(|o| o.total).sum()))
    }

    async fn list_billing(&self) -> Result<Vec<BillingRecord>, StoreError> {
        let billing = self.tables.read().await.billing.clone();
        Ok(newest_first(billing, |b| b.order_date))
    }

    async fn get_billing(&self, id: i64) -> Result<Option<BillingRecord>, StoreError> {
        Ok(self.tables.read().await.billing.iter().find(|b| b.id == id).cloned())
    }

    async fn list_inventory(&self, owner: UserId) -> Result<Vec<InventoryItem>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .inventory
            .iter()
            .filter(|(o, _)| *o == owner)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn get_inventory_item(&self, owner: UserId, id: i64) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .inventory
            .iter()
            .find(|(o, item)| *o == owner && item.id == id)
            .map(|(_, item)| item.clone()))
    }

    async fn create_inventory_item(
        &self,
        owner: UserId,
        item: &InventoryPayload,
        now: DateTime<Utc>,
    ) -> Result<InventoryItem, StoreError> {
        let mut tables = self.tables.write().await;
        let created = InventoryItem {
            id: tables.next_id("inventory_item"),
            name: item.name.clone(),
            category: item.category.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            status: StockStatus::classify(item.quantity, Decimal::from(DEFAULT_LOW_STOCK_THRESHOLD)),
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.inventory.push((owner, created.clone()));
        Ok(created)
    }

    async fn update_inventory_item(
        &self,
        owner: UserId,
        id: i64,
        patch: &InventoryPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .inventory
            .iter_mut()
            .find(|(o, item)| *o == owner && item.id == id)
            .map(|(_, item)| {
                patch.apply(item);
                item.updated_at = Some(now);
                item.status = StockStatus::classify(item.quantity, Decimal::from(DEFAULT_LOW_STOCK_THRESHOLD));
                item.clone()
            }))
    }

    async fn delete_inventory_item(&self, owner: UserId, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.inventory.len();
        tables.inventory.retain(|(o, item)| !(*o == owner && item.id == id));
        Ok(tables.inventory.len() != before)
    }

    async fn count_inventory(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().await.inventory.len())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|row| row.user.username == user.username) {
            return Err(StoreError::Conflict("app_user_username_key".to_string()));
        }
        let mut profile = UserProfile {
            avatar_initials: avatar_initials(&user.username, &user.first_name, &user.last_name),
            ..UserProfile::default()
        };
        if !user.restaurant_name.is_empty() {
            profile.restaurant_name = user.restaurant_name;
        }
        let created = User {
            id: tables.next_id("app_user"),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            profile,
            app_settings: UserSettings::default(),
        };
        tables.users.push(UserRow { user: created.clone(), password_hash: user.password_hash, is_active: true });
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .find(|row| row.user.id == id)
            .map(|row| row.user.clone()))
    }

    async fn find_credentials(&self, login: &str) -> Result<Option<Credentials>, StoreError> {
        let tables = self.tables.read().await;
        let row = tables
            .users
            .iter()
            .find(|row| row.user.username == login)
            .or_else(|| tables.users.iter().find(|row| row.user.email == login));
        Ok(row.map(|row| Credentials {
            user_id: row.user.id,
            password_hash: row.password_hash.clone(),
            is_active: row.is_active,
        }))
    }

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.users.iter().any(|row| row.user.username == username))
    }

    async fn email_taken(&self, email: &str, except: Option<UserId>) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .any(|row| row.user.email == email && Some(row.user.id) != except))
    }

    async fn update_profile(&self, id: UserId, req: &UpdateProfileRequest) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_mut(id).map(|row| {
            apply_profile_update(&mut row.user, req);
            row.user.clone()
        }))
    }

    async fn update_settings(
        &self,
        id: UserId,
        req: &UpdateSettingsRequest,
    ) -> Result<Option<UserSettings>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_mut(id).map(|row| {
            apply_settings_update(&mut row.user.app_settings, req);
            row.user.app_settings.clone()
        }))
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        if let Some(row) = self.tables.write().await.user_mut(id) {
            row.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn user_for_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .get(token)
            .and_then(|id| tables.users.iter().find(|row| row.user.id == *id && row.is_active))
            .map(|row| row.user.clone()))
    }

    async fn token_for(&self, id: UserId, fresh: &str) -> Result<String, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some((token, _)) = tables.tokens.iter().find(|(_, owner)| **owner == id) {
            return Ok(token.clone());
        }
        tables.tokens.insert(fresh.to_string(), id);
        Ok(fresh.to_string())
    }

    async fn replace_token(&self, id: UserId, fresh: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.tokens.retain(|_, owner| *owner != id);
        tables.tokens.insert(fresh.to_string(), id);
        Ok(())
    }

    async fn revoke_tokens(&self, id: UserId) -> Result<(), StoreError> {
        self.tables.write().await.tokens.retain(|_, owner| *owner != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::util::time::helper::get_utc_now;

    fn payload(name: &str, price: i64) -> MenuItemPayload {
        MenuItemPayload { name: name.to_string(), price: Decimal::new(price, 2), category: "Main".to_string() }
    }

    #[tokio::test]
    async fn settle_is_one_shot() {
        let store = MemoryStore::new();
        let pizza = store.create_menu_item(&payload("Pizza", 1299), get_utc_now()).await.unwrap();
        let order = store
            .create_order(NewOrder::from_menu("Alice".to_string(), vec![(pizza, 2)], get_utc_now()))
            .await
            .unwrap();
        assert_eq!(order.order_number, "ORD-20240601000000-1");

        let PayOutcome::Paid(record) = store.settle_order(order.id).await.unwrap() else {
            panic!("first payment should succeed");
        };
        assert_eq!(record.total_amount, Decimal::new(2598, 2));
        assert!(matches!(store.settle_order(order.id).await.unwrap(), PayOutcome::AlreadyPaid));
        assert!(matches!(store.settle_order(99).await.unwrap(), PayOutcome::NotFound));
        assert_eq!(store.list_orders(Some(OrderStatus::Open)).await.unwrap().len(), 0);
        assert_eq!(store.list_billing().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_menu_item_keeps_order_lines() {
        let store = MemoryStore::new();
        let soda = store.create_menu_item(&payload("Soda", 199), get_utc_now()).await.unwrap();
        let order = store
            .create_order(NewOrder::from_menu("Bob".to_string(), vec![(soda.clone(), 1)], get_utc_now()))
            .await
            .unwrap();
        assert!(store.delete_menu_item(soda.id).await.unwrap());
        assert!(!store.delete_menu_item(soda.id).await.unwrap());
        let order = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.items[0].menu_item, None);
        assert_eq!(order.items[0].menu_item_name, "Soda");
    }

    #[tokio::test]
    async fn inventory_is_owner_scoped() {
        let store = MemoryStore::new();
        let item = InventoryPayload {
            name: "Cheese".to_string(),
            category: "Dairy".to_string(),
            quantity: Decimal::from(5),
            unit: "kg".to_string(),
        };
        let created = store.create_inventory_item(1, &item, get_utc_now()).await.unwrap();
        assert!(created.status.is_low());
        assert!(store.get_inventory_item(2, created.id).await.unwrap().is_none());
        assert!(!store.delete_inventory_item(2, created.id).await.unwrap());
        assert_eq!(store.count_inventory().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn login_falls_back_to_email_and_tokens_rotate() {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: "chef".to_string(),
                email: "chef@yum.ai".to_string(),
                password_hash: "h".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                restaurant_name: "Bistro".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.profile.restaurant_name, "Bistro");
        assert_eq!(user.profile.avatar_initials, "CH");
        assert!(store.find_credentials("chef@yum.ai").await.unwrap().is_some());

        let first = store.token_for(user.id, "t1").await.unwrap();
        assert_eq!(store.token_for(user.id, "t2").await.unwrap(), first);
        store.replace_token(user.id, "t3").await.unwrap();
        assert!(store.user_for_token("t1").await.unwrap().is_none());
        assert_eq!(store.user_for_token("t3").await.unwrap().map(|u| u.id), Some(user.id));
    }
}
