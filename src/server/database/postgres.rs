use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use tokio::time;
use tokio_postgres::{Client, GenericClient, Row};

use crate::model::billing::BillingRecord;
use crate::model::inventory::{InventoryItem, InventoryPatch, InventoryPayload, StockStatus, DEFAULT_LOW_STOCK_THRESHOLD};
use crate::model::menu::{MenuItem, MenuItemId, MenuItemPayload};
use crate::model::order::{order_number, Order, OrderId, OrderLine, OrderStatus};
use crate::model::user::{
    UpdateProfileRequest, UpdateSettingsRequest, User, UserId, UserProfile, UserSettings,
};
use crate::server::database::pool::{Connection, Pool};
use crate::server::database::store::{apply_profile_update, apply_settings_update};
use crate::server::database::{Credentials, NewBilling, NewOrder, NewUser, PayOutcome, Store, StoreError};

pub const DB_TIMEOUT_SECONDS: u64 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

const MENU_COLUMNS: &str = "id, name, price, category, created_at";
const ORDER_COLUMNS: &str = "id, customer_name, order_number, order_date, total, status";
const BILLING_COLUMNS: &str = "id, order_number, customer_name, total_amount, order_date, items_summary, status";
const INVENTORY_COLUMNS: &str = "id, name, category, quantity, unit, created_at, updated_at";
const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.first_name, u.last_name,
           p.restaurant_name, p.phone, p.role, p.avatar_initials, p.theme, p.currency, p.language,
           p.notifications_enabled, p.low_stock_threshold, p.ai_model, p.gemini_api_key,
           s.restaurant_address, s.restaurant_phone, s.restaurant_email, s.business_hours,
           s.tax_rate, s.default_tip_percentage, s.receipt_footer
    FROM app_user u
    JOIN user_profile p ON p.user_id = u.id
    JOIN user_settings s ON s.user_id = u.id
"#;

/// Run one database round trip, giving up after `DB_TIMEOUT_SECONDS`.
async fn timed<T>(fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
    let sleep = time::sleep(Duration::from_secs(DB_TIMEOUT_SECONDS));
    tokio::pin!(sleep);
    tokio::select! {
        result = fut => result,
        _ = &mut sleep => {
            warn!("timeout waiting on the database");
            Err(StoreError::Timeout)
        }
    }
}

fn menu_item(row: &Row) -> Result<MenuItem, StoreError> {
    Ok(MenuItem {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
    })
}

fn order_header(row: &Row) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        customer_name: row.try_get("customer_name")?,
        order_number: row.try_get::<_, Option<String>>("order_number")?.unwrap_or_default(),
        order_date: row.try_get("order_date")?,
        total: row.try_get("total")?,
        status: status.parse().map_err(StoreError::Db)?,
        items: vec![],
    })
}

fn order_line(row: &Row) -> Result<OrderLine, StoreError> {
    Ok(OrderLine {
        id: row.try_get("id")?,
        menu_item: row.try_get("menu_item_id")?,
        menu_item_name: row.try_get("menu_item_name")?,
        menu_item_category: row.try_get("menu_item_category")?,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        subtotal: row.try_get("subtotal")?,
    })
}

fn billing_record(row: &Row) -> Result<BillingRecord, StoreError> {
    Ok(BillingRecord {
        id: row.try_get("id")?,
        order_number: row.try_get("order_number")?,
        customer_name: row.try_get("customer_name")?,
        total_amount: row.try_get("total_amount")?,
        order_date: row.try_get("order_date")?,
        items_summary: row.try_get("items_summary")?,
        status: row.try_get("status")?,
    })
}

fn inventory_item(row: &Row) -> Result<InventoryItem, StoreError> {
    let quantity: Decimal = row.try_get("quantity")?;
    Ok(InventoryItem {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        quantity,
        unit: row.try_get("unit")?,
        status: StockStatus::classify(quantity, Decimal::from(DEFAULT_LOW_STOCK_THRESHOLD)),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user(row: &Row) -> Result<User, StoreError> {
    let ai_api_key: String = row.try_get("gemini_api_key")?;
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        profile: UserProfile {
            restaurant_name: row.try_get("restaurant_name")?,
            phone: row.try_get("phone")?,
            role: role.parse().unwrap_or_default(),
            avatar_initials: row.try_get("avatar_initials")?,
            theme: row.try_get("theme")?,
            currency: row.try_get("currency")?,
            language: row.try_get("language")?,
            notifications_enabled: row.try_get("notifications_enabled")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            ai_model: row.try_get("ai_model")?,
            has_ai_key: !ai_api_key.is_empty(),
            ai_api_key,
        },
        app_settings: UserSettings {
            restaurant_address: row.try_get("restaurant_address")?,
            restaurant_phone: row.try_get("restaurant_phone")?,
            restaurant_email: row.try_get("restaurant_email")?,
            business_hours: row.try_get("business_hours")?,
            tax_rate: row.try_get("tax_rate")?,
            default_tip_percentage: row.try_get("default_tip_percentage")?,
            receipt_footer: row.try_get("receipt_footer")?,
        },
    })
}

/// Fill in the lines of already loaded order headers.
async fn attach_lines<C: GenericClient + Sync>(client: &C, mut orders: Vec<Order>) -> Result<Vec<Order>, StoreError> {
    if orders.is_empty() {
        return Ok(orders);
    }
    let ids = orders.iter().map(|o| o.id).collect::<Vec<_>>();
    let rows = client
        .query(
            r#"
            SELECT id, order_id, menu_item_id, menu_item_name, menu_item_category, quantity, price, subtotal
            FROM order_item
            WHERE order_id = ANY($1)
            ORDER BY id
            "#,
            &[&ids],
        )
        .await?;
    let mut lines: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
    for row in &rows {
        lines.entry(row.try_get("order_id")?).or_default().push(order_line(row)?);
    }
    for order in &mut orders {
        order.items = lines.remove(&order.id).unwrap_or_default();
    }
    Ok(orders)
}

async fn load_user<C: GenericClient + Sync>(client: &C, id: UserId, lock: bool) -> Result<Option<User>, StoreError> {
    let stmt = format!("{USER_SELECT} WHERE u.id = $1{}", if lock { " FOR UPDATE OF u" } else { "" });
    match client.query_opt(stmt.as_str(), &[&id]).await? {
        Some(row) => Ok(Some(user(&row)?)),
        None => Ok(None),
    }
}

/// PostgreSQL backed store with separate read and write pools.
pub struct PgStore {
    read_pool: Pool<Client>,
    write_pool: Pool<Client>,
}

impl PgStore {
    pub fn new(read_pool: Pool<Client>, write_pool: Pool<Client>) -> Self {
        Self { read_pool, write_pool }
    }

    pub async fn connect(read_conn_str: &str, write_conn_str: &str) -> Result<Self, anyhow::Error> {
        let (read_pool, write_pool) = tokio::try_join!(
            Pool::connect("read", read_conn_str, Pool::<Client>::DEFAULT_SIZE),
            Pool::connect("write", write_conn_str, Pool::<Client>::DEFAULT_SIZE),
        )?;
        info!("read pool={} idle={}, write pool={} idle={}", read_pool.name(), read_pool.idle(), write_pool.name(), write_pool.idle());
        Ok(Self::new(read_pool, write_pool))
    }

    async fn read(&self) -> Result<Connection<Client>, StoreError> {
        self.read_pool.acquire(ACQUIRE_TIMEOUT).await.ok_or(StoreError::PoolExhausted)
    }

    async fn write(&self) -> Result<Connection<Client>, StoreError> {
        self.write_pool.acquire(ACQUIRE_TIMEOUT).await.ok_or(StoreError::PoolExhausted)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_menu(&self) -> Result<Vec<MenuItem>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let rows = conn.query(format!("SELECT {MENU_COLUMNS} FROM menu_item ORDER BY id").as_str(), &[]).await?;
            rows.iter().map(menu_item).collect()
        })
        .await
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let stmt = format!("SELECT {MENU_COLUMNS} FROM menu_item WHERE id = $1");
            conn.query_opt(stmt.as_str(), &[&id]).await?.as_ref().map(menu_item).transpose()
        })
        .await
    }

    async fn create_menu_item(&self, item: &MenuItemPayload, now: DateTime<Utc>) -> Result<MenuItem, StoreError> {
        let conn = self.write().await?;
        timed(async {
            let stmt = format!(
                "INSERT INTO menu_item(name, price, category, created_at) VALUES ($1, $2, $3, $4) RETURNING {MENU_COLUMNS}"
            );
            let row = conn
                .query_one(stmt.as_str(), &[&item.name, &item.price.round_dp(2), &item.category, &now])
                .await?;
            menu_item(&row)
        })
        .await
    }

    async fn update_menu_item(&self, id: MenuItemId, item: &MenuItemPayload) -> Result<Option<MenuItem>, StoreError> {
        let conn = self.write().await?;
        timed(async {
            let stmt = format!(
                "UPDATE menu_item SET name = $2, price = $3, category = $4 WHERE id = $1 RETURNING {MENU_COLUMNS}"
            );
            conn.query_opt(stmt.as_str(), &[&id, &item.name, &item.price.round_dp(2), &item.category])
                .await?
                .as_ref()
                .map(menu_item)
                .transpose()
        })
        .await
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> Result<bool, StoreError> {
        let conn = self.write().await?;
        timed(async { Ok(conn.execute("DELETE FROM menu_item WHERE id = $1", &[&id]).await? > 0) }).await
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let conn = self.read().await?;
        let status = status.map(|s| s.to_string());
        timed(async {
            let stmt = format!(
                "SELECT {ORDER_COLUMNS} FROM customer_order WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY order_date DESC, id DESC"
            );
            let rows = conn.query(stmt.as_str(), &[&status]).await?;
            let orders = rows.iter().map(order_header).collect::<Result<Vec<_>, _>>()?;
            attach_lines(&*conn, orders).await
        })
        .await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let stmt = format!("SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = $1");
            let Some(row) = conn.query_opt(stmt.as_str(), &[&id]).await? else {
                return Ok(None);
            };
            Ok(attach_lines(&*conn, vec![order_header(&row)?]).await?.pop())
        })
        .await
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut conn = self.write().await?;
        timed(async move {
            let txn = conn.transaction().await?;
            let row = txn
                .query_one(
                    "INSERT INTO customer_order(customer_name, order_date, total, status) VALUES ($1, $2, $3, 'open') RETURNING id",
                    &[&order.customer_name, &order.order_date, &order.total],
                )
                .await?;
            let id: OrderId = row.try_get("id")?;
            let number = order_number(order.order_date, id);
            txn.execute("UPDATE customer_order SET order_number = $2 WHERE id = $1", &[&id, &number])
                .await?;
            let mut items = Vec::with_capacity(order.lines.len());
            for line in order.lines {
                let row = txn
                    .query_one(
                        r#"
                        INSERT INTO order_item(order_id, menu_item_id, menu_item_name, menu_item_category, quantity, price, subtotal)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        RETURNING id
                        "#,
                        &[&id, &line.menu_item_id, &line.name, &line.category, &line.quantity, &line.price, &line.subtotal],
                    )
                    .await?;
                items.push(OrderLine {
                    id: row.try_get("id")?,
                    menu_item: Some(line.menu_item_id),
                    menu_item_name: line.name,
                    menu_item_category: line.category,
                    quantity: line.quantity,
                    price: line.price,
                    subtotal: line.subtotal,
                });
            }
            txn.commit().await?;
            Ok(Order {
                id,
                customer_name: order.customer_name,
                order_number: number,
                order_date: order.order_date,
                total: order.total,
                status: OrderStatus::Open,
                items,
            })
        })
        .await
    }

    async fn settle_order(&self, id: OrderId) -> Result<PayOutcome, StoreError> {
        let mut conn = self.write().await?;
        timed(async move {
            let txn = conn.transaction().await?;
            // only one payment can win the open -> paid transition
            let flipped = txn
                .execute("UPDATE customer_order SET status = 'paid' WHERE id = $1 AND status = 'open'", &[&id])
                .await?;
            if flipped == 0 {
                let exists = txn.query_opt("SELECT 1 FROM customer_order WHERE id = $1", &[&id]).await?.is_some();
                return Ok(if exists { PayOutcome::AlreadyPaid } else { PayOutcome::NotFound });
            }
            let stmt = format!("SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = $1");
            let header = order_header(&txn.query_one(stmt.as_str(), &[&id]).await?)?;
            let order = attach_lines(&txn, vec![header])
                .await?
                .pop()
                .ok_or_else(|| StoreError::Db(format!("order={id} vanished while paying")))?;
            let billing = NewBilling::for_order(&order);
            let stmt = format!(
                r#"
                INSERT INTO billing_history(order_number, customer_name, total_amount, order_date, items_summary)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {BILLING_COLUMNS}
                "#
            );
            let row = txn
                .query_one(
                    stmt.as_str(),
                    &[
                        &billing.order_number,
                        &billing.customer_name,
                        &billing.total_amount,
                        &billing.order_date,
                        &billing.items_summary,
                    ],
                )
                .await?;
            let record = billing_record(&row)?;
            txn.commit().await?;
            Ok(PayOutcome::Paid(record))
        })
        .await
    }

    async fn count_orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(usize, Decimal), StoreError> {
        let conn = self.read().await?;
        timed(async {
            let row = conn
                .query_one(
                    "SELECT COUNT(*) AS n, COALESCE(SUM(total), 0) AS total FROM customer_order WHERE order_date >= $1 AND order_date < $2",
                    &[&from, &to],
                )
                .await?;
            let n: i64 = row.try_get("n")?;
            Ok((usize::try_from(n).unwrap_or_default(), row.try_get("total")?))
        })
        .await
    }

    async fn list_billing(&self) -> Result<Vec<BillingRecord>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let stmt = format!("SELECT {BILLING_COLUMNS} FROM billing_history ORDER BY order_date DESC NULLS LAST, id DESC");
            conn.query(stmt.as_str(), &[]).await?.iter().map(billing_record).collect()
        })
        .await
    }

    async fn get_billing(&self, id: i64) -> Result<Option<BillingRecord>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let stmt = format!("SELECT {BILLING_COLUMNS} FROM billing_history WHERE id = $1");
            conn.query_opt(stmt.as_str(), &[&id]).await?.as_ref().map(billing_record).transpose()
        })
        .await
    }

    async fn list_inventory(&self, owner: UserId) -> Result<Vec<InventoryItem>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let stmt = format!("SELECT {INVENTORY_COLUMNS} FROM inventory_item WHERE user_id = $1 ORDER BY id");
            conn.query(stmt.as_str(), &[&owner]).await?.iter().map(inventory_item).collect()
        })
        .await
    }

    async fn get_inventory_item(&self, owner: UserId, id: i64) -> Result<Option<InventoryItem>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let stmt = format!("SELECT {INVENTORY_COLUMNS} FROM inventory_item WHERE user_id = $1 AND id = $2");
            conn.query_opt(stmt.as_str(), &[&owner, &id]).await?.as_ref().map(inventory_item).transpose()
        })
        .await
    }

    async fn create_inventory_item(
        &self,
        owner: UserId,
        item: &InventoryPayload,
        now: DateTime<Utc>,
    ) -> Result<InventoryItem, StoreError> {
        let conn = self.write().await?;
        timed(async {
            let stmt = format!(
                r#"
                INSERT INTO inventory_item(user_id, name, category, quantity, unit, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                RETURNING {INVENTORY_COLUMNS}
                "#
            );
            let row = conn
                .query_one(stmt.as_str(), &[&owner, &item.name, &item.category, &item.quantity, &item.unit, &now])
                .await?;
            inventory_item(&row)
        })
        .await
    }

    async fn update_inventory_item(
        &self,
        owner: UserId,
        id: i64,
        patch: &InventoryPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let conn = self.write().await?;
        timed(async {
            let stmt = format!(
                r#"
                UPDATE inventory_item
                SET name = COALESCE($3, name),
                    category = COALESCE($4, category),
                    quantity = COALESCE($5, quantity),
                    unit = COALESCE($6, unit),
                    updated_at = $7
                WHERE user_id = $1 AND id = $2
                RETURNING {INVENTORY_COLUMNS}
                "#
            );
            conn.query_opt(
                stmt.as_str(),
                &[&owner, &id, &patch.name, &patch.category, &patch.quantity, &patch.unit, &now],
            )
            .await?
            .as_ref()
            .map(inventory_item)
            .transpose()
        })
        .await
    }

    async fn delete_inventory_item(&self, owner: UserId, id: i64) -> Result<bool, StoreError> {
        let conn = self.write().await?;
        timed(async {
            Ok(conn
                .execute("DELETE FROM inventory_item WHERE user_id = $1 AND id = $2", &[&owner, &id])
                .await?
                > 0)
        })
        .await
    }

    async fn count_inventory(&self) -> Result<usize, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let n: i64 = conn.query_one("SELECT COUNT(*) FROM inventory_item", &[]).await?.try_get(0)?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
        .await
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut conn = self.write().await?;
        timed(async move {
            let txn = conn.transaction().await?;
            let id: UserId = txn
                .query_one(
                    r#"
                    INSERT INTO app_user(username, email, password_hash, first_name, last_name)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                    &[&new.username, &new.email, &new.password_hash, &new.first_name, &new.last_name],
                )
                .await?
                .try_get("id")?;
            let defaults = UserProfile::default();
            let restaurant_name = if new.restaurant_name.is_empty() {
                defaults.restaurant_name
            } else {
                new.restaurant_name
            };
            let initials = crate::model::user::avatar_initials(&new.username, &new.first_name, &new.last_name);
            txn.execute(
                "INSERT INTO user_profile(user_id, restaurant_name, avatar_initials) VALUES ($1, $2, $3)",
                &[&id, &restaurant_name, &initials],
            )
            .await?;
            txn.execute("INSERT INTO user_settings(user_id) VALUES ($1)", &[&id]).await?;
            let created = load_user(&txn, id, false)
                .await?
                .ok_or_else(|| StoreError::Db(format!("user={id} missing after insert")))?;
            txn.commit().await?;
            Ok(created)
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let conn = self.read().await?;
        timed(async { load_user(&*conn, id, false).await }).await
    }

    async fn find_credentials(&self, login: &str) -> Result<Option<Credentials>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let row = conn
                .query_opt(
                    r#"
                    SELECT id, password_hash, is_active
                    FROM app_user
                    WHERE username = $1 OR email = $1
                    ORDER BY (username = $1) DESC, id
                    LIMIT 1
                    "#,
                    &[&login],
                )
                .await?;
            match row {
                Some(row) => Ok(Some(Credentials {
                    user_id: row.try_get("id")?,
                    password_hash: row.try_get("password_hash")?,
                    is_active: row.try_get("is_active")?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        let conn = self.read().await?;
        timed(async {
            Ok(conn
                .query_opt("SELECT 1 FROM app_user WHERE username = $1", &[&username])
                .await?
                .is_some())
        })
        .await
    }

    async fn email_taken(&self, email: &str, except: Option<UserId>) -> Result<bool, StoreError> {
        let conn = self.read().await?;
        timed(async {
            Ok(conn
                .query_opt(
                    "SELECT 1 FROM app_user WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2)",
                    &[&email, &except],
                )
                .await?
                .is_some())
        })
        .await
    }

    async fn update_profile(&self, id: UserId, req: &UpdateProfileRequest) -> Result<Option<User>, StoreError> {
        let mut conn = self.write().await?;
        timed(async move {
            let txn = conn.transaction().await?;
            let Some(mut user) = load_user(&txn, id, true).await? else {
                return Ok(None);
            };
            apply_profile_update(&mut user, req);
            txn.execute(
                "UPDATE app_user SET first_name = $2, last_name = $3, email = $4 WHERE id = $1",
                &[&id, &user.first_name, &user.last_name, &user.email],
            )
            .await?;
            let p = &user.profile;
            txn.execute(
                r#"
                UPDATE user_profile
                SET restaurant_name = $2, phone = $3, avatar_initials = $4, theme = $5, currency = $6,
                    language = $7, notifications_enabled = $8, low_stock_threshold = $9, ai_model = $10,
                    gemini_api_key = $11, updated_at = now()
                WHERE user_id = $1
                "#,
                &[
                    &id,
                    &p.restaurant_name,
                    &p.phone,
                    &p.avatar_initials,
                    &p.theme,
                    &p.currency,
                    &p.language,
                    &p.notifications_enabled,
                    &p.low_stock_threshold,
                    &p.ai_model,
                    &p.ai_api_key,
                ],
            )
            .await?;
            txn.commit().await?;
            Ok(Some(user))
        })
        .await
    }

    async fn update_settings(
        &self,
        id: UserId,
        req: &UpdateSettingsRequest,
    ) -> Result<Option<UserSettings>, StoreError> {
        let mut conn = self.write().await?;
        timed(async move {
            let txn = conn.transaction().await?;
            let Some(mut user) = load_user(&txn, id, true).await? else {
                return Ok(None);
            };
            apply_settings_update(&mut user.app_settings, req);
            let s = &user.app_settings;
            txn.execute(
                r#"
                UPDATE user_settings
                SET restaurant_address = $2, restaurant_phone = $3, restaurant_email = $4, business_hours = $5,
                    tax_rate = $6, default_tip_percentage = $7, receipt_footer = $8, updated_at = now()
                WHERE user_id = $1
                "#,
                &[
                    &id,
                    &s.restaurant_address,
                    &s.restaurant_phone,
                    &s.restaurant_email,
                    &s.business_hours,
                    &s.tax_rate,
                    &s.default_tip_percentage,
                    &s.receipt_footer,
                ],
            )
            .await?;
            txn.commit().await?;
            Ok(Some(user.app_settings))
        })
        .await
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let conn = self.write().await?;
        timed(async {
            conn.execute("UPDATE app_user SET password_hash = $2 WHERE id = $1", &[&id, &password_hash])
                .await?;
            Ok(())
        })
        .await
    }

    async fn user_for_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let conn = self.read().await?;
        timed(async {
            let row = conn
                .query_opt(
                    "SELECT t.user_id FROM auth_token t JOIN app_user u ON u.id = t.user_id WHERE t.key = $1 AND u.is_active",
                    &[&token],
                )
                .await?;
            match row {
                Some(row) => load_user(&*conn, row.try_get("user_id")?, false).await,
                None => Ok(None),
            }
        })
        .await
    }

    async fn token_for(&self, id: UserId, fresh: &str) -> Result<String, StoreError> {
        let conn = self.write().await?;
        timed(async {
            conn.execute(
                "INSERT INTO auth_token(key, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
                &[&fresh, &id],
            )
            .await?;
            Ok(conn
                .query_one("SELECT key FROM auth_token WHERE user_id = $1", &[&id])
                .await?
                .try_get("key")?)
        })
        .await
    }

    async fn replace_token(&self, id: UserId, fresh: &str) -> Result<(), StoreError> {
        let mut conn = self.write().await?;
        timed(async move {
            let txn = conn.transaction().await?;
            txn.execute("DELETE FROM auth_token WHERE user_id = $1", &[&id]).await?;
            txn.execute("INSERT INTO auth_token(key, user_id) VALUES ($1, $2)", &[&fresh, &id])
                .await?;
            txn.commit().await?;
            Ok(())
        })
        .await
    }

    async fn revoke_tokens(&self, id: UserId) -> Result<(), StoreError> {
        let conn = self.write().await?;
        timed(async {
            conn.execute("DELETE FROM auth_token WHERE user_id = $1", &[&id]).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timed_gives_up_on_slow_queries() {
        time::pause();
        let slow = async {
            time::sleep(Duration::from_secs(DB_TIMEOUT_SECONDS + 1)).await;
            Ok::<_, StoreError>(1)
        };
        assert!(matches!(timed(slow).await, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn exhausted_pool_reports_busy() {
        time::pause();
        let store = PgStore::new(Pool::new("read"), Pool::new("write"));
        assert!(matches!(store.list_menu().await, Err(StoreError::PoolExhausted)));
        assert!(matches!(store.settle_order(1).await, Err(StoreError::PoolExhausted)));
    }
}
