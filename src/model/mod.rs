//! Records exchanged between the backend and its clients.

pub mod billing;
pub mod dashboard;
pub mod inventory;
pub mod menu;
pub mod order;
pub mod user;

/// Fallback category for items the menu no longer knows about.
pub const DEFAULT_CATEGORY: &str = "Menu";
