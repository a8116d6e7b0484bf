use chrono::DateTime;

pub mod helper {
    #[cfg(not(test))]
    pub use super::get_utc_now;
    #[cfg(test)]
    pub use super::mock_chrono::get_utc_now;
}


#[cfg(not(test))]
pub fn get_utc_now() -> DateTime<chrono::Utc> {
    chrono::Utc::now()
}
