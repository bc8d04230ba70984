use axum_extra::extract::cookie::Key;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::response::{ServerError, ServerResult};

/// Issuer of access/refresh tokens minted by `POST /token`.
pub const OAUTH_ISSUER: &str = "cartridge:oauth";
/// Issuer of the JWT carried inside the signed session cookie.
pub const SESSION_ISSUER: &str = "cartridge:auth";

pub const ACCESS_TOKEN_TTL_SECS: i64 = 30 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;
pub const SESSION_TTL_SECS: i64 = 14 * 24 * 3600;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Space-joined scope list, OAuth style.
    #[serde(default)]
    pub scopes: String,
    #[serde(rename = "type", default)]
    pub token_type: String,
}

pub fn mint_token(
    secret: &str,
    sub: &str,
    issuer: &str,
    token_type: &str,
    scopes: &str,
    ttl_secs: i64,
) -> ServerResult<String> {
    let now = Utc::now().timestamp();
    let claims = TokenClaims {
        sub: sub.to_string(),
        iss: issuer.to_string(),
        iat: now,
        exp: now + ttl_secs,
        scopes: scopes.to_string(),
        token_type: token_type.to_string(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| ServerError::internal_error("Failed to sign token"))
}

pub fn verify_token(secret: &str, token: &str, issuer: &str) -> ServerResult<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);

    let decoded = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ServerError::expired_token("Token expired")
        }
        _ => ServerError::invalid_token("Token verification failed"),
    })?;
    Ok(decoded.claims)
}

pub fn mint_access_token(secret: &str, username: &str, scopes: &str) -> ServerResult<String> {
    mint_token(
        secret,
        username,
        OAUTH_ISSUER,
        TOKEN_TYPE_ACCESS,
        scopes,
        ACCESS_TOKEN_TTL_SECS,
    )
}

pub fn mint_refresh_token(secret: &str, username: &str, scopes: &str) -> ServerResult<String> {
    mint_token(
        secret,
        username,
        OAUTH_ISSUER,
        TOKEN_TYPE_REFRESH,
        scopes,
        REFRESH_TOKEN_TTL_SECS,
    )
}

pub fn mint_session_token(secret: &str, username: &str) -> ServerResult<String> {
    mint_token(
        secret,
        username,
        SESSION_ISSUER,
        TOKEN_TYPE_ACCESS,
        "",
        SESSION_TTL_SECS,
    )
}

/// Signed-cookie key derived from the auth secret. `Key::from` wants at
/// least 64 bytes of material, so stretch the secret with two hash rounds.
pub fn cookie_key(secret: &str) -> Key {
    let first = Sha256::digest(secret.as_bytes());
    let second = Sha256::digest(first);
    let mut material = [0u8; 64];
    material[..32].copy_from_slice(&first);
    material[32..].copy_from_slice(&second);
    Key::from(&material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{AuthError, ServerError};

    const SECRET: &str = "test_secret";

    #[test]
    fn access_token_round_trips() {
        let token = mint_access_token(SECRET, "alice", "roms.read me.read").unwrap();
        let claims = verify_token(SECRET, &token, OAUTH_ISSUER).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.scopes, "roms.read me.read");
    }

    #[test]
    fn issuer_mismatch_is_invalid() {
        let token = mint_session_token(SECRET, "alice").unwrap();
        let err = verify_token(SECRET, &token, OAUTH_ISSUER).unwrap_err();
        assert!(matches!(
            err,
            ServerError::AuthError(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = mint_access_token(SECRET, "alice", "").unwrap();
        assert!(verify_token("other_secret", &token, OAUTH_ISSUER).is_err());
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let token = mint_token(SECRET, "alice", OAUTH_ISSUER, TOKEN_TYPE_ACCESS, "", -120).unwrap();
        let err = verify_token(SECRET, &token, OAUTH_ISSUER).unwrap_err();
        assert!(matches!(
            err,
            ServerError::AuthError(AuthError::ExpiredToken(_))
        ));
    }

    #[test]
    fn refresh_tokens_keep_their_type() {
        let token = mint_refresh_token(SECRET, "alice", "roms.read").unwrap();
        let claims = verify_token(SECRET, &token, OAUTH_ISSUER).unwrap();
        assert_eq!(claims.token_type, "refresh");
    }
}
