use actix_web::{post, web, HttpRequest, Responder};
use log::warn;

use crate::ai::{generate, Feature, ForecastFeature, GenerateRequest, InsightsFeature, ReportFeature, AI_KEY_HEADER};
use crate::server::controller::auth::AuthUser;
use crate::server::controller::error::CustomError;
use crate::server::state::AppState;

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Header key, then the caller's stored key. `None` leaves the provider's own key.
fn api_key<'a>(req: &'a HttpRequest, user: &'a AuthUser) -> Option<&'a str> {
    req.headers()
        .get(AI_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(non_empty)
        .or_else(|| non_empty(&user.0.profile.ai_api_key))
}

async fn run<F: Feature>(
    req: &HttpRequest,
    user: &AuthUser,
    body: &GenerateRequest,
    data: &AppState,
) -> Result<F::Output, CustomError> {
    let model = body
        .model
        .as_deref()
        .and_then(non_empty)
        .or_else(|| non_empty(&user.0.profile.ai_model))
        .unwrap_or(data.default_model());
    generate::<F>(data.ai(), model, api_key(req, user), &body.data).await.map_err(|e| {
        warn!("{} generation failed for user={}, {}", F::NAME, user.0.username, e);
        CustomError::from(e)
    })
}

#[post("/api/ai/insights/")]
async fn insights(
    req: HttpRequest,
    user: AuthUser,
    body: web::Json<GenerateRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    Ok(web::Json(run::<InsightsFeature>(&req, &user, &body, &data).await?))
}

#[post("/api/ai/forecast/")]
async fn forecast(
    req: HttpRequest,
    user: AuthUser,
    body: web::Json<GenerateRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    Ok(web::Json(run::<ForecastFeature>(&req, &user, &body, &data).await?))
}

#[post("/api/ai/report/")]
async fn report(
    req: HttpRequest,
    user: AuthUser,
    body: web::Json<GenerateRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    Ok(web::Json(run::<ReportFeature>(&req, &user, &body, &data).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .service(insights)
        .service(forecast)
        .service(report);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    use crate::ai::feature::tests::CannedProvider;
    use crate::ai::{ExecutiveReport, ForecastEntry, Insights, AI_KEY_HEADER};
    use crate::model::user::UpdateProfileRequest;
    use crate::server::configure;
    use crate::server::controller::testing::{auth, data, signed_in};
    use crate::server::database::{MemoryStore, Store};

    #[actix_web::test]
    async fn requires_token() {
        let store = Arc::new(MemoryStore::new());
        let app = test::init_service(
            App::new().app_data(data(store, Arc::new(CannedProvider::replying("{}")))).configure(configure),
        )
        .await;
        let req = test::TestRequest::post().uri("/api/ai/report/").set_json(json!({"data": {}})).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn header_key_beats_stored_key() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(CannedProvider::replying(
            "```json\n{\"summary\": \"Busy week\", \"highlights\": [\"Burgers\"]}\n```",
        ));
        let (user, token) = signed_in(&store, "chef").await;
        let update = UpdateProfileRequest { gemini_api_key: Some("stored-key".to_string()), ..Default::default() };
        store.update_profile(user.id, &update).await.unwrap();
        let app =
            test::init_service(App::new().app_data(data(store.clone(), provider.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/ai/report/")
            .insert_header(auth(&token))
            .insert_header((AI_KEY_HEADER, "header-key"))
            .set_json(json!({"model": "gemini-1.5-pro", "data": {"total_orders": 3}}))
            .to_request();
        let report: ExecutiveReport = test::call_and_read_body_json(&app, req).await;
        assert_eq!(report.summary, "Busy week");
        assert_eq!(report.highlights, vec!["Burgers".to_string()]);

        let req = test::TestRequest::post()
            .uri("/api/ai/insights/")
            .insert_header(auth(&token))
            .set_json(json!({"data": {}}))
            .to_request();
        // not insights-shaped, so every list comes back empty
        let insights: Insights = test::call_and_read_body_json(&app, req).await;
        assert_eq!(insights, Insights::default());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].0.model, "gemini-1.5-pro");
        assert_eq!(seen[0].1.as_deref(), Some("header-key"));
        assert_eq!(seen[0].0.messages[1].content, "Metrics: {\"total_orders\":3}");
        assert_eq!(seen[1].0.model, "gemini-2.0-flash");
        assert_eq!(seen[1].1.as_deref(), Some("stored-key"));
    }

    #[actix_web::test]
    async fn falls_back_to_provider_key() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(CannedProvider::replying("[{\"item_name\": \"Buns\", \"recommended_reorder\": 40}]"));
        let (_, token) = signed_in(&store, "chef").await;
        let app =
            test::init_service(App::new().app_data(data(store.clone(), provider.clone())).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/ai/forecast/")
            .insert_header(auth(&token))
            .set_json(json!({"data": []}))
            .to_request();
        let forecast: Vec<ForecastEntry> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(forecast.len(), 1);
        assert_eq!(forecast[0].item_name, "Buns");
        assert_eq!(forecast[0].recommended_reorder, 40.0);
        assert_eq!(provider.seen.lock().unwrap()[0].1, None);
    }

    #[actix_web::test]
    async fn provider_failure_is_bad_gateway() {
        let store = Arc::new(MemoryStore::new());
        let (_, token) = signed_in(&store, "chef").await;
        let app = test::init_service(
            App::new().app_data(data(store.clone(), Arc::new(CannedProvider::failing(429)))).configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/ai/insights/")
            .insert_header(auth(&token))
            .set_json(json!({"data": {}}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }
}
