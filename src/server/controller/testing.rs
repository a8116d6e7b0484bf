//! Shared fixtures for controller tests.

use std::sync::Arc;

use actix_web::web;

use crate::ai::feature::tests::CannedProvider;
use crate::model::user::User;
use crate::server::database::{MemoryStore, NewUser, Store};
use crate::server::state::AppState;
use crate::server::util::credentials::{generate_token, hash_password};

pub(crate) const PASSWORD: &str = "s3cure-pass";

pub(crate) fn data(store: Arc<MemoryStore>, provider: Arc<CannedProvider>) -> web::Data<AppState> {
    web::Data::new(AppState::new(store, provider, "gemini-2.0-flash".to_string()))
}

pub(crate) fn memory_data() -> (Arc<MemoryStore>, web::Data<AppState>) {
    let store = Arc::new(MemoryStore::new());
    let data = data(store.clone(), Arc::new(CannedProvider::replying("{}")));
    (store, data)
}

/// A stored user plus a live token for it.
pub(crate) async fn signed_in(store: &MemoryStore, username: &str) -> (User, String) {
    let user = store
        .create_user(NewUser {
            username: username.to_string(),
            email: format!("{username}@yum.ai"),
            password_hash: hash_password(PASSWORD).unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            restaurant_name: String::new(),
        })
        .await
        .unwrap();
    let token = store.token_for(user.id, &generate_token()).await.unwrap();
    (user, token)
}

pub(crate) fn auth(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Token {token}"))
}
