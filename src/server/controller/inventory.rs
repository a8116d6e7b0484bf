use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use log::info;

use crate::model::inventory::{InventoryItem, InventoryPatch, InventoryPayload, InventoryQuery, InventoryStats};
use crate::server::controller::auth::AuthUser;
use crate::server::controller::error::{CustomError, FieldErrors};
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

/// The caller's items, classified against the caller's own threshold.
async fn owned_items(user: &AuthUser, data: &AppState) -> Result<Vec<InventoryItem>, CustomError> {
    let threshold = user.low_stock_threshold();
    Ok(data
        .store()
        .list_inventory(user.0.id)
        .await?
        .into_iter()
        .map(|item| item.classified(threshold))
        .collect())
}

fn patch_problems(patch: &InventoryPatch) -> FieldErrors {
    let mut errors = FieldErrors::default();
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        errors.add("name", "This field may not be blank.");
    }
    if patch.quantity.is_some_and(|q| q.is_sign_negative() && !q.is_zero()) {
        errors.add("quantity", "Ensure this value is greater than or equal to 0.");
    }
    errors
}

async fn apply_patch(
    user: &AuthUser,
    id: i64,
    patch: &InventoryPatch,
    data: &AppState,
) -> Result<InventoryItem, CustomError> {
    patch_problems(patch).into_result()?;
    let item = data
        .store()
        .update_inventory_item(user.0.id, id, patch, get_utc_now())
        .await?
        .ok_or(CustomError::ResourceNotFound)?;
    Ok(item.classified(user.low_stock_threshold()))
}

#[get("/inventory/items/")]
/// `?search=` matches name or category, `?category=` is an exact match
async fn list_items(
    user: AuthUser,
    query: web::Query<InventoryQuery>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let items = owned_items(&user, &data).await?;
    Ok(web::Json(items.into_iter().filter(|i| query.matches(i)).collect::<Vec<_>>()))
}

#[post("/inventory/items/")]
async fn create_item(
    user: AuthUser,
    body: web::Json<InventoryPayload>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let mut errors = FieldErrors::default();
    errors.extend(body.problems());
    errors.into_result()?;
    let item = data.store().create_inventory_item(user.0.id, &body, get_utc_now()).await?;
    info!("user={} stocked inventory item={}", user.0.id, item.id);
    Ok(HttpResponse::Created().json(item.classified(user.low_stock_threshold())))
}

#[get("/inventory/items/stats/")]
async fn item_stats(user: AuthUser, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    Ok(web::Json(InventoryStats::from_items(&owned_items(&user, &data).await?)))
}

#[get("/inventory/items/low_stock/")]
async fn low_stock_items(user: AuthUser, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let items = owned_items(&user, &data).await?;
    Ok(web::Json(items.into_iter().filter(|i| i.status.is_low()).collect::<Vec<_>>()))
}

#[get("/inventory/items/{id}/")]
async fn get_item(user: AuthUser, id: web::Path<i64>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let item = data
        .store()
        .get_inventory_item(user.0.id, id.into_inner())
        .await?
        .ok_or(CustomError::ResourceNotFound)?;
    Ok(web::Json(item.classified(user.low_stock_threshold())))
}

#[put("/inventory/items/{id}/")]
async fn replace_item(
    user: AuthUser,
    id: web::Path<i64>,
    body: web::Json<InventoryPayload>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let mut errors = FieldErrors::default();
    errors.extend(body.problems());
    errors.into_result()?;
    let InventoryPayload { name, category, quantity, unit } = body.into_inner();
    let patch = InventoryPatch { name: Some(name), category: Some(category), quantity: Some(quantity), unit: Some(unit) };
    Ok(web::Json(apply_patch(&user, id.into_inner(), &patch, &data).await?))
}

#[patch("/inventory/items/{id}/")]
async fn patch_item(
    user: AuthUser,
    id: web::Path<i64>,
    body: web::Json<InventoryPatch>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    Ok(web::Json(apply_patch(&user, id.into_inner(), &body, &data).await?))
}

#[delete("/inventory/items/{id}/")]
async fn delete_item(user: AuthUser, id: web::Path<i64>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let id = id.into_inner();
    if !data.store().delete_inventory_item(user.0.id, id).await? {
        return Err(CustomError::ResourceNotFound);
    }
    info!("user={} removed inventory item={}", user.0.id, id);
    Ok(HttpResponse::NoContent().finish())
}

/// Fixed paths go before `{id}`, which would otherwise swallow them.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .service(item_stats)
        .service(low_stock_items)
        .service(list_items)
        .service(create_item)
        .service(get_item)
        .service(replace_item)
        .service(patch_item)
        .service(delete_item);
}
