use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::info;

use crate::model::menu::{MenuItemId, MenuItemPayload};
use crate::server::controller::error::{CustomError, FieldErrors};
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

fn validate(item: &MenuItemPayload) -> Result<(), CustomError> {
    let mut errors = FieldErrors::default();
    errors.extend(item.problems());
    errors.into_result()
}

#[get("/api/menu-items/")]
/// list the menu
async fn list_menu_items(data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    Ok(web::Json(data.store().list_menu().await?))
}

#[post("/api/menu-items/")]
async fn create_menu_item(
    body: web::Json<MenuItemPayload>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    validate(&body)?;
    let item = data.store().create_menu_item(&body, get_utc_now()).await?;
    info!("created menu item={}", item.id);
    Ok(HttpResponse::Created().json(item))
}

#[get("/api/menu-items/{id}/")]
async fn get_menu_item(id: web::Path<MenuItemId>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let item = data.store().get_menu_item(id.into_inner()).await?;
    Ok(web::Json(item.ok_or(CustomError::ResourceNotFound)?))
}

#[put("/api/menu-items/{id}/")]
/// replace name, price and category
async fn update_menu_item(
    id: web::Path<MenuItemId>,
    body: web::Json<MenuItemPayload>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    validate(&body)?;
    let item = data.store().update_menu_item(id.into_inner(), &body).await?;
    Ok(web::Json(item.ok_or(CustomError::ResourceNotFound)?))
}

#[delete("/api/menu-items/{id}/")]
async fn delete_menu_item(id: web::Path<MenuItemId>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let id = id.into_inner();
    if !data.store().delete_menu_item(id).await? {
        return Err(CustomError::ResourceNotFound);
    }
    info!("deleted menu item={}", id);
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .service(list_menu_items)
        .service(create_menu_item)
        .service(get_menu_item)
        .service(update_menu_item)
        .service(delete_menu_item);
}
