/// Agent authentication tokens
///
/// Compact JWS (`header.claims.signature`, base64url without padding) signed
/// with the agent's secp256k1 key. `iat` and `exp` are Unix milliseconds.
use crate::{
    crypto::keys::verify_signature_bytes,
    error::{IdentityError, IdentityResult},
    identity::Identity,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ALGORITHM: &str = "ES256K";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// `<agentDid><agentName>`
    pub iss: String,
    /// User DID the agent acts for
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl AuthClaims {
    /// DID half of the issuer reference
    pub fn issuer_did(&self) -> &str {
        self.iss.split_once('#').map(|(did, _)| did).unwrap_or(&self.iss)
    }
}

/// An issued token and the claims it carries
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    pub claims: AuthClaims,
}

pub struct TokenIssuer;

impl TokenIssuer {
    /// Sign a token for `agent` acting as `user_did`, valid for `duration_ms` from `now`
    ///
    /// Delegation checks are the caller's job.
    pub fn issue(
        agent: &Identity,
        user_did: &str,
        duration_ms: i64,
        audience: &str,
        now: DateTime<Utc>,
    ) -> IdentityResult<AuthToken> {
        if duration_ms <= 0 {
            return Err(IdentityError::InvalidDuration(format!(
                "durationMs must be positive, got {}",
                duration_ms
            )));
        }

        let iat = now.timestamp_millis();
        let exp = iat.checked_add(duration_ms).ok_or_else(|| {
            IdentityError::InvalidDuration(format!("durationMs {} overflows", duration_ms))
        })?;

        let claims = AuthClaims {
            iss: agent.key_reference(),
            sub: user_did.to_string(),
            aud: audience.to_string(),
            iat,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = agent.keys().sign_bytes(signing_input.as_bytes());
        let token = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature));

        Ok(AuthToken { token, claims })
    }

    /// Check signature, audience and expiry; valid while `now < exp`
    pub fn validate(
        token: &str,
        audience: &str,
        issuer_public_key_base58: &str,
        now: DateTime<Utc>,
    ) -> IdentityResult<AuthClaims> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| malformed("missing signature"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| malformed("signature is not base64url"))?;

        if !verify_signature_bytes(issuer_public_key_base58, signing_input.as_bytes(), &signature)
        {
            return Err(IdentityError::Unauthorized(
                "token signature does not verify".to_string(),
            ));
        }

        let claims = Self::decode_unverified(token)?;

        if claims.aud != audience {
            return Err(IdentityError::Unauthorized(format!(
                "token audience {} does not match {}",
                claims.aud, audience
            )));
        }
        if now.timestamp_millis() >= claims.exp {
            return Err(IdentityError::Unauthorized("Token has expired".to_string()));
        }

        Ok(claims)
    }

    /// Read the claims without checking anything
    pub fn decode_unverified(token: &str) -> IdentityResult<AuthClaims> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(_), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected three segments"));
        };

        let header: Header = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(malformed("unsupported algorithm"));
        }

        decode_segment(claims)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> IdentityResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| malformed("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| malformed("segment is not valid JSON"))
}

fn malformed(reason: &str) -> IdentityError {
    IdentityError::Unauthorized(format!("malformed token: {}", reason))
}
