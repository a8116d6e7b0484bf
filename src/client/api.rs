use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use derive_more::{Display, Error};
use log::{debug, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::ai::{Feature, GenerateRequest, AI_KEY_HEADER};
use crate::client::session::Session;
use crate::model::billing::{BillingItemsResponse, BillingLine, BillingRecord};
use crate::model::dashboard::DashboardStats;
use crate::model::inventory::{InventoryItem, InventoryPatch, InventoryPayload, InventoryQuery, InventoryStats};
use crate::model::menu::{MenuItem, MenuItemId, MenuItemPayload};
use crate::model::order::{CreateOrderRequest, Order, OrderId, OrderStatus, PayOrderRequest, PayOrderResponse};
use crate::model::user::{
    AuthResponse, AvailabilityResponse, ChangePasswordRequest, LoginRequest, MessageResponse, ProfileResponse,
    RegisterRequest, SettingsResponse, TokenResponse, UpdateProfileRequest, UpdateSettingsRequest, User,
};

#[derive(Debug, Display, Error)]
pub enum ClientError {
    #[display("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[display("session expired, please log in again")]
    LoginRequired,
    #[display("request failed: {_0}")]
    Transport(#[error(not(source))] String),
    #[display("unexpected response: {_0}")]
    Decode(#[error(not(source))] String),
    #[display("session file: {_0}")]
    Session(#[error(not(source))] String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// REST client sharing one session across concurrent page reads.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Mutex<Session>,
    session_path: Option<PathBuf>,
    sent_to_login: AtomicBool,
}

impl ApiClient {
    /// Session kept in memory only.
    pub fn new(base_url: &str, session: Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Mutex::new(session),
            session_path: None,
            sent_to_login: AtomicBool::new(false),
        }
    }

    /// Session loaded from and written back to `path`.
    pub fn with_session_file(base_url: &str, path: PathBuf) -> Result<Self, ClientError> {
        let session = Session::load(&path)?;
        Ok(Self { session_path: Some(path), ..Self::new(base_url, session) })
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn session(&self) -> Session {
        self.lock().clone()
    }

    /// Change the session and persist it.
    pub fn update_session(&self, change: impl FnOnce(&mut Session)) -> Result<(), ClientError> {
        let mut session = self.lock();
        change(&mut session);
        match &self.session_path {
            Some(path) => session.save(path),
            None => Ok(()),
        }
    }

    /// Whether a 401 has already sent the user back to login.
    pub fn sent_to_login(&self) -> bool {
        self.sent_to_login.load(Ordering::SeqCst)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.lock().token.clone() {
            Some(token) => req.header(AUTHORIZATION, format!("Token {token}")),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let res = req.send().await?;
        let status = res.status();
        let body = res.bytes().await?.to_vec();
        debug!("got status={} with {} bytes", status, body.len());
        Ok((status, body))
    }

    fn http_error(status: StatusCode, body: &[u8]) -> ClientError {
        let body = String::from_utf8_lossy(body).into_owned();
        let body = if body.is_empty() { status.canonical_reason().unwrap_or_default().to_string() } else { body };
        ClientError::Http { status: status.as_u16(), body }
    }

    /// A 401 drops the token and profile. Only the first one after a sign in asks for a fresh login.
    fn unauthorized(&self, body: &[u8]) -> ClientError {
        if let Err(e) = self.update_session(Session::sign_out) {
            warn!("failed to clear session, {}", e);
        }
        if self.sent_to_login.swap(true, Ordering::SeqCst) {
            Self::http_error(StatusCode::UNAUTHORIZED, body)
        } else {
            ClientError::LoginRequired
        }
    }

    async fn execute(&self, req: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        match self.send(req).await? {
            (StatusCode::UNAUTHORIZED, body) => Err(self.unauthorized(&body)),
            (status, body) if !status.is_success() => Err(Self::http_error(status, &body)),
            (_, body) => Ok(body),
        }
    }

    /// For the login and register forms, where a 401 is a wrong password rather than an expired session.
    async fn execute_anonymous(&self, req: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        match self.send(req).await? {
            (status, body) if !status.is_success() => Err(Self::http_error(status, &body)),
            (_, body) => Ok(body),
        }
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        decode(&self.execute(req).await?)
    }

    // menu

    pub async fn menu(&self) -> Result<Vec<MenuItem>, ClientError> {
        self.call(self.request(Method::GET, "/api/menu-items/")).await
    }

    pub async fn create_menu_item(&self, item: &MenuItemPayload) -> Result<MenuItem, ClientError> {
        self.call(self.request(Method::POST, "/api/menu-items/").json(item)).await
    }

    pub async fn update_menu_item(&self, id: MenuItemId, item: &MenuItemPayload) -> Result<MenuItem, ClientError> {
        self.call(self.request(Method::PUT, &format!("/api/menu-items/{id}/")).json(item)).await
    }

    pub async fn delete_menu_item(&self, id: MenuItemId) -> Result<(), ClientError> {
        self.execute(self.request(Method::DELETE, &format!("/api/menu-items/{id}/"))).await?;
        Ok(())
    }

    // orders and billing

    pub async fn orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, ClientError> {
        let mut req = self.request(Method::GET, "/api/orders/");
        if let Some(status) = status {
            req = req.query(&[("status", status.to_string())]);
        }
        self.call(req).await
    }

    pub async fn order(&self, id: OrderId) -> Result<Order, ClientError> {
        self.call(self.request(Method::GET, &format!("/api/orders/{id}/"))).await
    }

    pub async fn create_order(&self, order: &CreateOrderRequest) -> Result<Order, ClientError> {
        self.call(self.request(Method::POST, "/api/orders/create_order/").json(order)).await
    }

    pub async fn pay_order(&self, id: OrderId) -> Result<PayOrderResponse, ClientError> {
        let body = PayOrderRequest { order_id: Some(id) };
        self.call(self.request(Method::POST, "/api/pay-order/").json(&body)).await
    }

    pub async fn billing_history(&self) -> Result<Vec<BillingRecord>, ClientError> {
        self.call(self.request(Method::GET, "/api/billing-history/")).await
    }

    pub async fn billing_items(&self, id: i64) -> Result<Vec<BillingLine>, ClientError> {
        let res: BillingItemsResponse =
            self.call(self.request(Method::GET, &format!("/api/billing-history/{id}/items/"))).await?;
        Ok(res.items)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        self.call(self.request(Method::GET, "/dashboard/stats/")).await
    }

    // inventory

    pub async fn inventory(&self, query: &InventoryQuery) -> Result<Vec<InventoryItem>, ClientError> {
        self.call(self.request(Method::GET, "/inventory/items/").query(query)).await
    }

    pub async fn create_inventory_item(&self, item: &InventoryPayload) -> Result<InventoryItem, ClientError> {
        self.call(self.request(Method::POST, "/inventory/items/").json(item)).await
    }

    pub async fn patch_inventory_item(&self, id: i64, patch: &InventoryPatch) -> Result<InventoryItem, ClientError> {
        self.call(self.request(Method::PATCH, &format!("/inventory/items/{id}/")).json(patch)).await
    }

    pub async fn delete_inventory_item(&self, id: i64) -> Result<(), ClientError> {
        self.execute(self.request(Method::DELETE, &format!("/inventory/items/{id}/"))).await?;
        Ok(())
    }

    pub async fn inventory_stats(&self) -> Result<InventoryStats, ClientError> {
        self.call(self.request(Method::GET, "/inventory/items/stats/")).await
    }

    pub async fn low_stock(&self) -> Result<Vec<InventoryItem>, ClientError> {
        self.call(self.request(Method::GET, "/inventory/items/low_stock/")).await
    }

    // account

    fn signed_in(&self, res: &AuthResponse) -> Result<(), ClientError> {
        self.update_session(|s| {
            s.token = Some(res.token.clone());
            s.user = Some(res.user.clone());
            s.theme = Some(res.user.profile.theme.clone());
        })?;
        self.sent_to_login.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let body = self.execute_anonymous(self.request(Method::POST, "/users/register/").json(req)).await?;
        let res: AuthResponse = decode(&body)?;
        self.signed_in(&res)?;
        Ok(res)
    }

    /// `login` is a username or an email.
    pub async fn login(&self, login: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let req = LoginRequest { username: login.to_string(), password: password.to_string() };
        let body = self.execute_anonymous(self.request(Method::POST, "/users/login/").json(&req)).await?;
        let res: AuthResponse = decode(&body)?;
        self.signed_in(&res)?;
        Ok(res)
    }

    /// The local session is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        let res = self.call(self.request(Method::POST, "/users/logout/")).await;
        self.update_session(Session::sign_out)?;
        res
    }

    pub async fn profile(&self) -> Result<User, ClientError> {
        let user: User = self.call(self.request(Method::GET, "/users/profile/")).await?;
        self.update_session(|s| s.user = Some(user.clone()))?;
        Ok(user)
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> Result<ProfileResponse, ClientError> {
        let res: ProfileResponse = self.call(self.request(Method::PATCH, "/users/profile/update/").json(req)).await?;
        self.update_session(|s| {
            s.theme = Some(res.user.profile.theme.clone());
            s.user = Some(res.user.clone());
        })?;
        Ok(res)
    }

    pub async fn update_settings(&self, req: &UpdateSettingsRequest) -> Result<SettingsResponse, ClientError> {
        let res: SettingsResponse = self.call(self.request(Method::PATCH, "/users/settings/").json(req)).await?;
        self.update_session(|s| {
            if let Some(user) = s.user.as_mut() {
                user.app_settings = res.settings.clone();
            }
        })?;
        Ok(res)
    }

    /// Swaps the stored token for the rotated one.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<TokenResponse, ClientError> {
        let req = ChangePasswordRequest { old_password: old_password.to_string(), new_password: new_password.to_string() };
        let res: TokenResponse = self.call(self.request(Method::POST, "/users/change-password/").json(&req)).await?;
        self.update_session(|s| s.token = Some(res.token.clone()))?;
        self.sent_to_login.store(false, Ordering::SeqCst);
        Ok(res)
    }

    pub async fn username_available(&self, username: &str) -> Result<bool, ClientError> {
        let req = self.request(Method::GET, "/users/check-username/").query(&[("username", username)]);
        let res: AvailabilityResponse = decode(&self.execute_anonymous(req).await?)?;
        Ok(res.available)
    }

    pub async fn email_available(&self, email: &str) -> Result<bool, ClientError> {
        let req = self.request(Method::GET, "/users/check-email/").query(&[("email", email)]);
        let res: AvailabilityResponse = decode(&self.execute_anonymous(req).await?)?;
        Ok(res.available)
    }

    // ai

    /// One generation through the backend. A locally kept key rides along as `X-AI-Key`.
    pub async fn generate<F: Feature>(
        &self,
        model: Option<&str>,
        data: serde_json::Value,
    ) -> Result<F::Output, ClientError> {
        let body = GenerateRequest { model: model.map(str::to_string), data };
        let mut req = self.request(Method::POST, &format!("/api/ai/{}/", F::NAME)).json(&body);
        if let Some(key) = self.lock().ai_key.clone().filter(|k| !k.is_empty()) {
            req = req.header(AI_KEY_HEADER, key);
        }
        self.call(req).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::TcpListener;
    use std::sync::Arc;

    use actix_web::{App, HttpServer};

    use super::*;
    use crate::ai::feature::tests::CannedProvider;
    use crate::server::configure;
    use crate::server::controller::testing::{data, signed_in, PASSWORD};
    use crate::server::database::{MemoryStore, Store};

    /// A real server on an ephemeral port, returning its base url.
    pub(crate) fn serve(store: Arc<MemoryStore>, provider: Arc<CannedProvider>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let data = data(store, provider);
        let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
            .workers(1)
            .listen(listener)
            .unwrap()
            .run();
        actix_web::rt::spawn(server);
        format!("http://{addr}")
    }

    #[actix_web::test]
    async fn unauthorized_clears_session_and_sends_to_login_once() {
        let store = Arc::new(MemoryStore::new());
        let (user, _) = signed_in(&store, "chef").await;
        let base = serve(store.clone(), Arc::new(CannedProvider::replying("{}")));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let client = ApiClient::with_session_file(&base, path.clone()).unwrap();
        client.update_session(|s| s.ai_key = Some("mine".to_string())).unwrap();
        client.login("chef", PASSWORD).await.unwrap();
        assert!(Session::load(&path).unwrap().is_logged_in());
        assert_eq!(client.profile().await.unwrap().username, "chef");

        store.revoke_tokens(user.id).await.unwrap();
        assert!(matches!(client.low_stock().await, Err(ClientError::LoginRequired)));
        assert!(client.sent_to_login());
        let saved = Session::load(&path).unwrap();
        assert_eq!(saved.token, None);
        assert_eq!(saved.user, None);
        assert_eq!(saved.ai_key.as_deref(), Some("mine"));

        // no second trip to the login screen
        match client.inventory_stats().await {
            Err(ClientError::Http { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected a plain 401, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn every_expiry_after_a_fresh_login_asks_for_login() {
        let store = Arc::new(MemoryStore::new());
        let (user, _) = signed_in(&store, "chef").await;
        let base = serve(store.clone(), Arc::new(CannedProvider::replying("{}")));
        let client = ApiClient::new(&base, Session::default());

        client.login("chef", PASSWORD).await.unwrap();
        store.revoke_tokens(user.id).await.unwrap();
        assert!(matches!(client.low_stock().await, Err(ClientError::LoginRequired)));

        client.login("chef", PASSWORD).await.unwrap();
        assert!(!client.sent_to_login());
        assert!(client.low_stock().await.unwrap().is_empty());

        store.revoke_tokens(user.id).await.unwrap();
        assert!(matches!(client.low_stock().await, Err(ClientError::LoginRequired)));
        assert!(!client.session().is_logged_in());
    }

    #[actix_web::test]
    async fn wrong_password_is_not_a_session_expiry() {
        let store = Arc::new(MemoryStore::new());
        signed_in(&store, "chef").await;
        let base = serve(store, Arc::new(CannedProvider::replying("{}")));
        let client = ApiClient::new(&base, Session::default());

        let err = client.login("chef", "not-the-password").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 401: {\"error\":\"Invalid credentials\"}");
        assert!(!client.sent_to_login());
        assert!(client.username_available("someone-else").await.unwrap());
        assert!(!client.email_available("chef@yum.ai").await.unwrap());
    }

    #[actix_web::test]
    async fn checkout_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let base = serve(store, Arc::new(CannedProvider::replying("{}")));
        let client = ApiClient::new(&base, Session::default());

        let burger = client
            .create_menu_item(&MenuItemPayload {
                name: "Burger".to_string(),
                price: "8.99".parse().unwrap(),
                category: "Burgers".to_string(),
            })
            .await
            .unwrap();
        let mut cart = crate::analytics::cart::Cart::new();
        cart.add(&burger);
        cart.add(&burger);
        let order = client.create_order(&cart.to_order_request(Some("Bob"))).await.unwrap();
        assert_eq!(order.total, cart.total());

        let paid = client.pay_order(order.id).await.unwrap();
        assert_eq!(paid.total_amount, rust_decimal::Decimal::new(1798, 2));
        match client.pay_order(order.id).await {
            Err(ClientError::Http { status, .. }) => assert_eq!(status, 400),
            other => panic!("expected 400, got {other:?}"),
        }

        let items = client.billing_items(paid.billing_id).await.unwrap();
        assert_eq!(items[0].quantity, 2);
        assert_eq!(client.orders(Some(OrderStatus::Paid)).await.unwrap().len(), 1);
        assert!(client.orders(Some(OrderStatus::Open)).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn change_password_keeps_client_signed_in() {
        let store = Arc::new(MemoryStore::new());
        let (_, token) = signed_in(&store, "chef").await;
        let base = serve(store, Arc::new(CannedProvider::replying("{}")));
        let client = ApiClient::new(&base, Session { token: Some(token.clone()), ..Session::default() });

        client.change_password(PASSWORD, "another-pass-1").await.unwrap();
        assert_ne!(client.session().token, Some(token));
        assert!(client.inventory(&InventoryQuery::default()).await.unwrap().is_empty());
        client.logout().await.unwrap();
        assert!(!client.session().is_logged_in());
    }
}
