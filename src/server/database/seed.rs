//! Demo data for fresh installs. Safe to run repeatedly.

use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;

use crate::model::inventory::InventoryPayload;
use crate::model::menu::MenuItemPayload;
use crate::server::database::{NewOrder, NewUser, PayOutcome, Store, StoreError};
use crate::server::util::credentials::hash_password;

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo-password";

const MENU: [(&str, i64, &str); 9] = [
    ("Cheeseburger", 899, "Burgers"),
    ("Chicken Sandwich", 799, "Sandwiches"),
    ("Caesar Salad", 699, "Salads"),
    ("French Fries", 399, "Sides"),
    ("Onion Rings", 499, "Sides"),
    ("Soda", 199, "Drinks"),
    ("Milkshake", 499, "Drinks"),
    ("Pizza", 1299, "Main"),
    ("Pasta", 1099, "Main"),
];

const INVENTORY: [(&str, &str, i64, &str); 5] = [
    ("Tomatoes", "Vegetables", 50, "kg"),
    ("Lettuce", "Vegetables", 30, "kg"),
    ("Cheese", "Dairy", 5, "kg"),
    ("Chicken Breast", "Meat", 15, "kg"),
    ("Buns", "Bread", 80, "pcs"),
];

/// (menu position, quantity)
const SAMPLE_ORDER: [(usize, i32); 3] = [(0, 2), (3, 1), (5, 3)];
const SAMPLE_CUSTOMER: &str = "Alice Johnson";

pub async fn seed_demo_data(store: &dyn Store, now: DateTime<Utc>) -> Result<(), StoreError> {
    info!("seeding demo data");

    let existing = store.list_menu().await?;
    for (name, cents, category) in MENU {
        if existing.iter().any(|m| m.name == name) {
            continue;
        }
        let item = MenuItemPayload { name: name.to_string(), price: Decimal::new(cents, 2), category: category.to_string() };
        store.create_menu_item(&item, now).await?;
        info!("created menu item={}", name);
    }

    let demo = match store.find_credentials(DEMO_USERNAME).await? {
        Some(credentials) => credentials.user_id,
        None => {
            let user = store
                .create_user(NewUser {
                    username: DEMO_USERNAME.to_string(),
                    email: "demo@yumai.local".to_string(),
                    password_hash: hash_password(DEMO_PASSWORD).map_err(|e| StoreError::Db(e.to_string()))?,
                    first_name: "Demo".to_string(),
                    last_name: "User".to_string(),
                    restaurant_name: String::new(),
                })
                .await?;
            info!("created user={}", DEMO_USERNAME);
            user.id
        }
    };
    let stocked = store.list_inventory(demo).await?;
    for (name, category, quantity, unit) in INVENTORY {
        if stocked.iter().any(|i| i.name == name) {
            continue;
        }
        let item = InventoryPayload {
            name: name.to_string(),
            category: category.to_string(),
            quantity: Decimal::from(quantity),
            unit: unit.to_string(),
        };
        store.create_inventory_item(demo, &item, now).await?;
        info!("created inventory item={}", name);
    }

    if !store.list_orders(None).await?.is_empty() {
        info!("orders already exist, skipping sample order");
        return Ok(());
    }
    let menu = store.list_menu().await?;
    let picks = SAMPLE_ORDER
        .iter()
        .filter_map(|(pos, qty)| menu.get(*pos).map(|m| (m.clone(), *qty)))
        .collect::<Vec<_>>();
    if picks.len() < SAMPLE_ORDER.len() {
        return Ok(());
    }
    let order = store.create_order(NewOrder::from_menu(SAMPLE_CUSTOMER.to_string(), picks, now)).await?;
    if let PayOutcome::Paid(record) = store.settle_order(order.id).await? {
        info!("created sample order and billing={}", record.order_number);
    }
    Ok(())
}
