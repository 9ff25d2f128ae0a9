/// Agent auth token endpoints
use crate::{
    error::IdentityResult,
    identity::GetIdentityOptions,
    token::AuthClaims,
    AppContext,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub agent: GetIdentityOptions,
    pub user_did: String,
    pub duration_ms: i64,
    pub audience: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn create_token(
    State(ctx): State<AppContext>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> IdentityResult<Json<TokenResponse>> {
    let Json(req) = payload?;
    let token = ctx
        .engine
        .create_agent_auth_token(&req.agent, &req.user_did, req.duration_ms, &req.audience)
        .await?;

    Ok(Json(TokenResponse { token: token.token }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
    pub audience: String,
}

/// Check a token and return its claims
pub async fn validate_token(
    State(ctx): State<AppContext>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> IdentityResult<Json<AuthClaims>> {
    let Json(req) = payload?;
    let claims = ctx
        .engine
        .validate_agent_auth_token(&req.token, &req.audience)
        .await?;

    Ok(Json(claims))
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/tokens", post(create_token))
        .route("/api/tokens/validate", post(validate_token))
}
