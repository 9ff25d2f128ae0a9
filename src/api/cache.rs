/// Identity cache endpoints
use crate::{
    engine::CacheConfig,
    error::IdentityResult,
    identity::CachePolicy,
    AppContext,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn set_cache_config(
    State(ctx): State<AppContext>,
    payload: Result<Json<CacheConfig>, JsonRejection>,
) -> IdentityResult<Json<OkResponse>> {
    let Json(config) = payload?;
    ctx.engine.set_identities_cache_config(&config).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn get_cache_config(State(ctx): State<AppContext>) -> Json<CachePolicy> {
    Json(ctx.engine.cache().policy().await)
}

pub fn routes() -> Router<AppContext> {
    Router::new().route(
        "/api/cache/config",
        get(get_cache_config).post(set_cache_config),
    )
}
