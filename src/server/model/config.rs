use std::net::SocketAddrV4;

use derive_more::Display;

use crate::ai::AiConfig;

/// Which `Store` backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StoreKind {
    #[display("postgres")]
    Postgres,
    #[display("memory")]
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            s => Err(format!("Invalid STORE: {s}")),
        }
    }
}

/// Server configs
#[derive(Debug)]
pub struct ServerConfig {
    pub addr: SocketAddrV4,
    pub db_read_conn_str: String,
    pub db_write_conn_str: String,
    pub store: StoreKind,
    pub seed_demo_data: bool,
    pub ai: AiConfig,
}

impl ServerConfig {
    pub fn new(addr: SocketAddrV4, db_read_conn_str: String, db_write_conn_str: String) -> Self {
        Self {
            addr,
            db_read_conn_str,
            db_write_conn_str,
            store: StoreKind::Postgres,
            seed_demo_data: false,
            ai: AiConfig::default(),
        }
    }

    pub fn with_store(mut self, store: StoreKind, seed_demo_data: bool) -> Self {
        self.store = store;
        self.seed_demo_data = seed_demo_data;
        self
    }

    pub fn with_ai(mut self, ai: AiConfig) -> Self {
        self.ai = ai;
        self
    }
}
