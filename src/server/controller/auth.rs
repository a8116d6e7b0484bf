use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use log::debug;
use rust_decimal::Decimal;

use crate::model::user::User;
use crate::server::controller::error::CustomError;
use crate::server::state::AppState;

const SCHEMES: [&str; 2] = ["Token", "Bearer"];

/// The caller behind an `Authorization: Token <key>` header.
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn low_stock_threshold(&self) -> Decimal {
        Decimal::from(self.0.profile.low_stock_threshold)
    }
}

/// Key from `Token <key>` or `Bearer <key>`.
pub fn token_from(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = header.trim().split_once(' ')?;
    let key = key.trim();
    (SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) && !key.is_empty()).then(|| key.to_string())
}

impl FromRequest for AuthUser {
    type Error = CustomError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = token_from(req);
        Box::pin(async move {
            let (Some(state), Some(token)) = (state, token) else {
                return Err(CustomError::Unauthorized);
            };
            match state.store().user_for_token(&token).await? {
                Some(user) => Ok(AuthUser(user)),
                None => {
                    debug!("rejected unknown token");
                    Err(CustomError::Unauthorized)
                }
            }
        })
    }
}
