use std::collections::BTreeMap;
use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};
use log::error;
use pbkdf2::password_hash;
use serde::Serialize;
use serde_json::json;

use crate::ai::AiError;
use crate::server::database::StoreError;

/// Per-field validation messages, rendered as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0.entry(field.to_string()).or_default().push(message.to_string());
    }

    pub fn extend(&mut self, problems: impl IntoIterator<Item = (&'static str, &'static str)>) {
        for (field, message) in problems {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok` when nothing was recorded.
    pub fn into_result(self) -> Result<(), CustomError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CustomError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.0.keys().map(String::as_str).collect::<Vec<_>>();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[derive(Debug, Display, Error)]
pub enum CustomError {
    #[display("server is busy")]
    ServerIsBusy,
    #[display("{_0}")]
    BadRequest(#[error(not(source))] String),
    #[display("{_0}")]
    Validation(#[error(not(source))] FieldErrors),
    #[display("Authentication credentials were not provided or are invalid.")]
    Unauthorized,
    #[display("Invalid credentials")]
    InvalidCredentials,
    #[display("{_0}")]
    Forbidden(#[error(not(source))] String),
    #[display("Not found.")]
    ResourceNotFound,
    #[display("database error")]
    DbError,
    #[display("internal error")]
    Internal,
    #[display("timeout occurred")]
    Timeout,
    #[display("AI error: {_0}")]
    Upstream(#[error(not(source))] String),
}

impl CustomError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        CustomError::BadRequest(message.into())
    }
}

impl error::ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::ServerIsBusy | CustomError::DbError | CustomError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::BadRequest(_) | CustomError::Validation(_) => StatusCode::BAD_REQUEST,
            CustomError::Unauthorized | CustomError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            CustomError::Forbidden(_) => StatusCode::FORBIDDEN,
            CustomError::ResourceNotFound => StatusCode::NOT_FOUND,
            CustomError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CustomError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            CustomError::Validation(fields) => json!(fields),
            other => json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<StoreError> for CustomError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::PoolExhausted => CustomError::ServerIsBusy,
            StoreError::Timeout => CustomError::Timeout,
            StoreError::Conflict(constraint) => {
                CustomError::BadRequest(format!("duplicate value violates {constraint}"))
            }
            StoreError::Db(e) => {
                error!("store failed, {}", e);
                CustomError::DbError
            }
        }
    }
}

impl From<password_hash::Error> for CustomError {
    fn from(e: password_hash::Error) -> Self {
        error!("password hashing failed, {}", e);
        CustomError::Internal
    }
}

impl From<AiError> for CustomError {
    fn from(e: AiError) -> Self {
        CustomError::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;
    use actix_web::ResponseError;

    #[test]
    fn validation_renders_field_map() {
        let mut errors = FieldErrors::single("password", "Password fields didn't match.");
        errors.add("email", "A user with this email already exists.");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let body = err.error_response().into_body().try_into_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["password"][0], "Password fields didn't match.");
        assert_eq!(json["email"][0], "A user with this email already exists.");
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(CustomError::from(StoreError::PoolExhausted).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(CustomError::from(StoreError::Timeout).status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            CustomError::from(StoreError::Conflict("menu_item_name_key".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::default().into_result().is_ok());
    }
}
