//! main file for the server

pub mod controller;
pub mod database;
pub mod model;
pub mod state;
pub mod util;

use std::sync::Arc;

use actix_web::{error, middleware::Logger, web, App, HttpServer};
use log::{info, warn};

use crate::ai::{ChatProvider, GeminiClient};
use crate::server::controller::error::CustomError;
use crate::server::database::seed::seed_demo_data;
use crate::server::database::{MemoryStore, PgStore, Store};
use crate::server::model::config::{ServerConfig, StoreKind};
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

/// Every route, plus JSON body errors rendered like the rest.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| error::Error::from(CustomError::bad_request(err.to_string()))),
    )
    .configure(controller::menu::configure)
    .configure(controller::orders::configure)
    .configure(controller::billing::configure)
    .configure(controller::dashboard::configure)
    .configure(controller::inventory::configure)
    .configure(controller::users::configure)
    .configure(controller::ai::configure);
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn Store>> {
    Ok(match config.store {
        StoreKind::Postgres => {
            Arc::new(PgStore::connect(&config.db_read_conn_str, &config.db_write_conn_str).await?)
        }
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    })
}

/// Run the server
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let store = open_store(&config).await.map_err(std::io::Error::other)?;
    info!("using store={}", config.store);
    // the memory store starts empty on every boot
    if config.seed_demo_data || config.store == StoreKind::Memory {
        if let Err(e) = seed_demo_data(store.as_ref(), get_utc_now()).await {
            warn!("failed to seed demo data, {}", e);
        }
    }
    let provider: Arc<dyn ChatProvider> = Arc::new(GeminiClient::new(&config.ai).map_err(std::io::Error::other)?);
    let data = web::Data::new(AppState::new(store, provider, config.ai.default_model.clone()));

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(configure)
    })
    .bind(config.addr)?
    .run()
    .await
}
