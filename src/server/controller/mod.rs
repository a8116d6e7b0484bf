pub mod ai;
pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod error;
pub mod inventory;
pub mod menu;
pub mod orders;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;
