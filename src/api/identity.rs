/// Identity API endpoints
/// Seeds, identity creation and document lookup
use crate::{
    error::{IdentityError, IdentityResult},
    identity::{CreateIdentityOptions, DidDocument, SubjectType},
    AppContext,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PongResponse {
    pub result: String,
}

pub async fn ping(State(ctx): State<AppContext>) -> Json<PongResponse> {
    Json(PongResponse {
        result: ctx.engine.ping().to_string(),
    })
}

/// New random seed with its mnemonic form
#[derive(Debug, Serialize, Deserialize)]
pub struct SeedResponse {
    pub seed: String,
    #[serde(rename = "mnemonics")]
    pub mnemonic: String,
}

pub async fn create_seed(State(ctx): State<AppContext>) -> IdentityResult<Json<SeedResponse>> {
    let seed = ctx.engine.create_default_seed();

    Ok(Json(SeedResponse {
        seed: seed.to_base58(),
        mnemonic: seed.mnemonic()?,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityRequest {
    pub resolver_address: String,
    pub identity: CreateIdentityOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DidResponse {
    pub did: String,
}

/// Create (or find) an identity of the type named in the path
pub async fn create_identity(
    State(ctx): State<AppContext>,
    Path(subject_type): Path<String>,
    payload: Result<Json<CreateIdentityRequest>, JsonRejection>,
) -> IdentityResult<Json<DidResponse>> {
    let Json(req) = payload?;
    let subject_type = match subject_type.as_str() {
        "agent" => SubjectType::Agent,
        "user" => SubjectType::User,
        "twin" => SubjectType::Twin,
        other => {
            return Err(IdentityError::InvalidArgument(format!(
                "Unknown subject type '{}'",
                other
            )))
        }
    };

    let did = ctx
        .engine
        .create_identity(&req.resolver_address, &req.identity, subject_type)
        .await?;

    Ok(Json(DidResponse { did }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentParams {
    pub resolver_address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub doc: DidDocument,
}

pub async fn get_registered_document(
    State(ctx): State<AppContext>,
    Path(did): Path<String>,
    Query(params): Query<DocumentParams>,
) -> IdentityResult<Json<DocumentResponse>> {
    let doc = ctx
        .engine
        .get_registered_document(&params.resolver_address, &did)
        .await?;

    Ok(Json(DocumentResponse { doc }))
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/seed", post(create_seed))
        .route("/api/identities/:subject_type", post(create_identity))
        .route("/api/documents/:did", get(get_registered_document))
}
