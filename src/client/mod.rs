//! Staff client: the dashboard pages as fetch, aggregate and render steps over the REST API.

pub mod api;
pub mod pages;
pub mod session;

pub use api::{ApiClient, ClientError};
pub use session::Session;
