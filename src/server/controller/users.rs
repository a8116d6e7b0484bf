use actix_web::{get, post, route, web, HttpResponse, Responder};
use log::info;
use serde::Deserialize;

use crate::model::user::{
    AuthResponse, AvailabilityResponse, ChangePasswordRequest, LoginRequest, MessageResponse, ProfileResponse,
    RegisterRequest, SettingsResponse, TokenResponse, UpdateProfileRequest, UpdateSettingsRequest,
};
use crate::server::controller::auth::AuthUser;
use crate::server::controller::error::{CustomError, FieldErrors};
use crate::server::database::NewUser;
use crate::server::state::AppState;
use crate::server::util::credentials::{
    generate_token, hash_password, is_valid_email, password_problems, verify_password,
};

const BLANK: &str = "This field may not be blank.";
const BAD_EMAIL: &str = "Enter a valid email address.";

#[derive(Debug, Deserialize)]
struct UsernameQuery {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    #[serde(default)]
    email: String,
}

async fn register_problems(req: &RegisterRequest, data: &AppState) -> Result<FieldErrors, CustomError> {
    let store = data.store();
    let mut errors = FieldErrors::default();
    if req.username.trim().is_empty() {
        errors.add("username", BLANK);
    } else if store.username_taken(&req.username).await? {
        errors.add("username", "A user with that username already exists.");
    }
    if req.email.trim().is_empty() {
        errors.add("email", BLANK);
    } else if !is_valid_email(&req.email) {
        errors.add("email", BAD_EMAIL);
    }
    if req.password.is_empty() {
        errors.add("password", BLANK);
    } else {
        for problem in password_problems(&req.password, &req.username) {
            errors.add("password", problem);
        }
    }
    if req.password2.is_empty() {
        errors.add("password2", BLANK);
    }
    if !errors.is_empty() {
        return Ok(errors);
    }
    // cross-field checks only once every field is individually valid
    if req.password != req.password2 {
        errors.add("password", "Password fields didn't match.");
    } else if store.email_taken(&req.email, None).await? {
        errors.add("email", "A user with this email already exists.");
    }
    Ok(errors)
}

#[post("/users/register/")]
/// create an account and hand back its token
async fn register(body: web::Json<RegisterRequest>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    register_problems(&body, &data).await?.into_result()?;
    let RegisterRequest { username, email, password, first_name, last_name, restaurant_name, .. } = body.into_inner();
    let user = data
        .store()
        .create_user(NewUser {
            password_hash: hash_password(&password)?,
            username,
            email,
            first_name,
            last_name,
            restaurant_name,
        })
        .await?;
    let token = data.store().token_for(user.id, &generate_token()).await?;
    info!("registered user={}", user.username);
    Ok(HttpResponse::Created().json(AuthResponse { message: "User registered successfully".to_string(), token, user }))
}

#[post("/users/login/")]
/// `username` may also be the account email
async fn login(body: web::Json<LoginRequest>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let mut errors = FieldErrors::default();
    if body.username.trim().is_empty() {
        errors.add("username", BLANK);
    }
    if body.password.is_empty() {
        errors.add("password", BLANK);
    }
    errors.into_result()?;

    let store = data.store();
    let Some(credentials) = store.find_credentials(body.username.trim()).await? else {
        return Err(CustomError::InvalidCredentials);
    };
    if !verify_password(&body.password, &credentials.password_hash) {
        return Err(CustomError::InvalidCredentials);
    }
    if !credentials.is_active {
        return Err(CustomError::Forbidden("Account is disabled".to_string()));
    }
    let user = store.get_user(credentials.user_id).await?.ok_or(CustomError::InvalidCredentials)?;
    let token = store.token_for(user.id, &generate_token()).await?;
    info!("user={} logged in", user.username);
    Ok(web::Json(AuthResponse { message: "Login successful".to_string(), token, user }))
}

#[post("/users/logout/")]
async fn logout(user: AuthUser, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    data.store().revoke_tokens(user.0.id).await?;
    Ok(web::Json(MessageResponse { message: "Logout successful".to_string() }))
}

#[get("/users/profile/")]
async fn get_profile(user: AuthUser) -> Result<impl Responder, CustomError> {
    Ok(web::Json(user.0))
}

#[route("/users/profile/update/", method = "PUT", method = "PATCH")]
async fn update_profile(
    user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    if let Some(email) = &body.email {
        if !is_valid_email(email) {
            return Err(CustomError::Validation(FieldErrors::single("email", BAD_EMAIL)));
        }
        if data.store().email_taken(email, Some(user.0.id)).await? {
            return Err(CustomError::bad_request("Email already in use"));
        }
    }
    let updated = data
        .store()
        .update_profile(user.0.id, &body)
        .await?
        .ok_or(CustomError::ResourceNotFound)?;
    Ok(web::Json(ProfileResponse { message: "Profile updated successfully".to_string(), user: updated }))
}

#[route("/users/settings/", method = "PUT", method = "PATCH")]
async fn update_settings(
    user: AuthUser,
    body: web::Json<UpdateSettingsRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    if body.restaurant_email.as_deref().is_some_and(|e| !e.is_empty() && !is_valid_email(e)) {
        return Err(CustomError::Validation(FieldErrors::single("restaurant_email", BAD_EMAIL)));
    }
    let settings = data
        .store()
        .update_settings(user.0.id, &body)
        .await?
        .ok_or(CustomError::ResourceNotFound)?;
    Ok(web::Json(SettingsResponse { message: "Settings updated successfully".to_string(), settings }))
}

#[post("/users/change-password/")]
/// Rotates the caller's token; the old one stops working.
async fn change_password(
    user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let mut errors = FieldErrors::default();
    if body.old_password.is_empty() {
        errors.add("old_password", BLANK);
    }
    if body.new_password.is_empty() {
        errors.add("new_password", BLANK);
    } else {
        for problem in password_problems(&body.new_password, &user.0.username) {
            errors.add("new_password", problem);
        }
    }
    errors.into_result()?;

    let store = data.store();
    let credentials = store
        .find_credentials(&user.0.username)
        .await?
        .filter(|c| c.user_id == user.0.id)
        .ok_or(CustomError::Unauthorized)?;
    if !verify_password(&body.old_password, &credentials.password_hash) {
        return Err(CustomError::bad_request("Current password is incorrect"));
    }
    store.set_password(user.0.id, &hash_password(&body.new_password)?).await?;
    let token = generate_token();
    store.replace_token(user.0.id, &token).await?;
    info!("user={} changed password", user.0.username);
    Ok(web::Json(TokenResponse { message: "Password changed successfully".to_string(), token }))
}

#[get("/users/check-username/")]
async fn check_username(query: web::Query<UsernameQuery>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    if query.username.is_empty() {
        return Err(CustomError::bad_request("Username is required"));
    }
    let taken = data.store().username_taken(&query.username).await?;
    Ok(web::Json(AvailabilityResponse { available: !taken }))
}

#[get("/users/check-email/")]
async fn check_email(query: web::Query<EmailQuery>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    if query.email.is_empty() {
        return Err(CustomError::bad_request("Email is required"));
    }
    let taken = data.store().email_taken(&query.email, None).await?;
    Ok(web::Json(AvailabilityResponse { available: !taken }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .service(register)
        .service(login)
        .service(logout)
        .service(get_profile)
        .service(update_profile)
        .service(update_settings)
        .service(change_password)
        .service(check_username)
        .service(check_email);
}
