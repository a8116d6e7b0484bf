//! YumAI restaurant management: REST backend, aggregation routines, AI proxy and staff client.

pub mod ai;
pub mod analytics;
pub mod client;
pub mod model;
pub mod server;
