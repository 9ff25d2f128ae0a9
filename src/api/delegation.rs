/// Delegation API endpoints
use crate::{
    error::{IdentityError, IdentityResult},
    identity::{DelegationRecord, GetIdentityOptions},
    AppContext,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    pub resolver_address: String,
    /// Twin (control) or user (authentication) granting the capability
    pub subject: GetIdentityOptions,
    pub agent: GetIdentityOptions,
    pub delegation_name: String,
}

/// Grant an agent control over a twin or authentication for a user
pub async fn delegate(
    State(ctx): State<AppContext>,
    Path(kind): Path<String>,
    payload: Result<Json<DelegationRequest>, JsonRejection>,
) -> IdentityResult<Json<DelegationRecord>> {
    let Json(req) = payload?;
    let record = match kind.as_str() {
        "control" => {
            ctx.engine
                .delegate_control(
                    &req.resolver_address,
                    &req.subject,
                    &req.agent,
                    &req.delegation_name,
                )
                .await?
        }
        "authentication" => {
            ctx.engine
                .delegate_authentication(
                    &req.resolver_address,
                    &req.subject,
                    &req.agent,
                    &req.delegation_name,
                )
                .await?
        }
        other => {
            return Err(IdentityError::InvalidArgument(format!(
                "Unknown delegation kind '{}'",
                other
            )))
        }
    };

    Ok(Json(record))
}

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/delegations/:kind", post(delegate))
}
