/// Identity Engine
///
/// Decentralized identities derived from a seed: DID registration on a
/// resolver, control and authentication delegations between identities, and
/// short-lived agent auth tokens, served over HTTP.

pub mod api;
pub mod config;
pub mod context;
pub mod crypto;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod identity;
pub mod server;
pub mod token;

pub use context::AppContext;
pub use engine::{CacheConfig, IdentityEngine, IdentityEngineConfig};
pub use error::{IdentityError, IdentityResult};
