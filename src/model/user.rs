use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::inventory::DEFAULT_LOW_STOCK_THRESHOLD;

pub type UserId = i64;

pub const DEFAULT_AI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_RESTAURANT_NAME: &str = "My Restaurant";
pub const DEFAULT_RECEIPT_FOOTER: &str = "Thank you for your business!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile: UserProfile,
    pub app_settings: UserSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[display("admin")]
    Admin,
    #[display("manager")]
    Manager,
    #[default]
    #[display("staff")]
    Staff,
    #[display("viewer")]
    Viewer,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "staff" => Ok(Self::Staff),
            "viewer" => Ok(Self::Viewer),
            s => Err(format!("Invalid role: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub restaurant_name: String,
    pub phone: String,
    pub role: Role,
    pub avatar_initials: String,
    pub theme: String,
    pub currency: String,
    pub language: String,
    pub notifications_enabled: bool,
    pub low_stock_threshold: i32,
    pub ai_model: String,
    /// The stored provider key never leaves the server, only whether one is set.
    #[serde(skip)]
    pub ai_api_key: String,
    #[serde(default)]
    pub has_ai_key: bool,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            restaurant_name: DEFAULT_RESTAURANT_NAME.to_string(),
            phone: String::new(),
            role: Role::default(),
            avatar_initials: String::new(),
            theme: "light".to_string(),
            currency: "USD".to_string(),
            language: "en".to_string(),
            notifications_enabled: true,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            ai_model: DEFAULT_AI_MODEL.to_string(),
            ai_api_key: String::new(),
            has_ai_key: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub restaurant_address: String,
    pub restaurant_phone: String,
    pub restaurant_email: String,
    pub business_hours: String,
    pub tax_rate: Decimal,
    pub default_tip_percentage: Decimal,
    pub receipt_footer: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            restaurant_address: String::new(),
            restaurant_phone: String::new(),
            restaurant_email: String::new(),
            business_hours: String::new(),
            tax_rate: Decimal::new(0, 2),
            default_tip_percentage: Decimal::new(1500, 2),
            receipt_footer: DEFAULT_RECEIPT_FOOTER.to_string(),
        }
    }
}

/// Two letters for the avatar: first+last name initials, else the first two of the username.
pub fn avatar_initials(username: &str, first_name: &str, last_name: &str) -> String {
    match (first_name.chars().next(), last_name.chars().next()) {
        (Some(f), Some(l)) => format!("{f}{l}").to_uppercase(),
        _ => username.chars().take(2).collect::<String>().to_uppercase(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub restaurant_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    /// username or email
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub restaurant_name: Option<String>,
    pub phone: Option<String>,
    pub theme: Option<String>,
    pub currency: Option<String>,
    pub language: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub low_stock_threshold: Option<i32>,
    pub ai_model: Option<String>,
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    pub restaurant_address: Option<String>,
    pub restaurant_phone: Option<String>,
    pub restaurant_email: Option<String>,
    pub business_hours: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub default_tip_percentage: Option<Decimal>,
    pub receipt_footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub message: String,
    pub settings: UserSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
