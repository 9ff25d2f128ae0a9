/// API routes and handlers
pub mod cache;
pub mod delegation;
pub mod identity;
pub mod token;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(identity::routes())
        .merge(delegation::routes())
        .merge(token::routes())
        .merge(cache::routes())
}
