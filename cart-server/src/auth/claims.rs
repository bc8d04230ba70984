use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::extract::SignedCookieJar;
use cart_shared::roles::Role;
use headers::{
    Authorization,
    authorization::{Basic, Bearer},
};
use mongodb::bson::oid::ObjectId;

use crate::auth::{passwords, tokens};
use crate::models::user::UserDoc;
use crate::response::{ServerError, ServerResult};
use crate::util::app_state::AppState;

pub const SESSION_COOKIE: &str = "cartridge_session";

/// The authenticated caller. Resolved, in order, from the signed session
/// cookie, a Bearer access token, or Basic credentials.
#[derive(Debug, Clone)]
pub struct Claims {
    pub user_id: ObjectId,
    pub username: String,
    pub role: Role,
    pub scopes: Vec<String>,
}

impl FromRequestParts<AppState> for Claims {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar: SignedCookieJar = SignedCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| ServerError::internal_error("Cookie jar unavailable"))?;

        // A cookie with a bad signature comes back as absent, not an error.
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            let token = tokens::verify_token(
                &state.config.auth_secret_key,
                cookie.value(),
                tokens::SESSION_ISSUER,
            )?;
            return Self::resolve_user(state, &token.sub, None).await;
        }

        if let Ok(TypedHeader(Authorization(bearer))) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
        {
            return Self::from_bearer(state, bearer.token()).await;
        }

        if let Ok(TypedHeader(Authorization(basic))) =
            TypedHeader::<Authorization<Basic>>::from_request_parts(parts, state).await
        {
            return Self::from_basic(state, basic.username(), basic.password()).await;
        }

        Err(ServerError::missing_token("Missing authorization"))
    }
}

impl Claims {
    async fn from_bearer(state: &AppState, token: &str) -> ServerResult<Self> {
        let claims = tokens::verify_token(
            &state.config.auth_secret_key,
            token,
            tokens::OAUTH_ISSUER,
        )?;

        // Refresh tokens only buy new access tokens, never resources.
        if claims.token_type == tokens::TOKEN_TYPE_REFRESH {
            return Err(ServerError::missing_token("Missing authorization"));
        }

        Self::resolve_user(state, &claims.sub, Some(&claims.scopes)).await
    }

    async fn from_basic(state: &AppState, username: &str, password: &str) -> ServerResult<Self> {
        let user = UserDoc::find_by_username(&state.db, username)
            .await?
            .ok_or_else(|| ServerError::unauthorized("Invalid credentials"))?;
        if !passwords::verify_password(password, &user.hashed_password) {
            return Err(ServerError::unauthorized("Invalid credentials"));
        }
        Self::resolve_user(state, &user.username, None).await
    }

    /// Loads the user behind a validated credential. Bearer grants are
    /// narrowed to the intersection of token scopes and the role's scopes.
    async fn resolve_user(
        state: &AppState,
        username: &str,
        token_scopes: Option<&str>,
    ) -> ServerResult<Self> {
        let user = UserDoc::find_by_username(&state.db, username)
            .await?
            .ok_or_else(|| ServerError::forbidden("User not found"))?;
        if !user.enabled {
            return Err(ServerError::forbidden("Inactive user"));
        }
        let user_id = user
            .id
            .ok_or_else(|| ServerError::internal_error("User document missing id"))?;

        UserDoc::touch_active(&state.db, &user_id).await;

        let role_scopes: Vec<String> = user.role.scopes().iter().map(|s| s.to_string()).collect();
        let scopes: Vec<String> = match token_scopes {
            Some(granted) => granted
                .split_whitespace()
                .map(String::from)
                .filter(|s| role_scopes.contains(s))
                .collect(),
            None => role_scopes,
        };

        Ok(Self {
            user_id,
            username: user.username,
            role: user.role,
            scopes,
        })
    }

    pub fn require_scope(&self, scope: &str) -> ServerResult<()> {
        if self.scopes.iter().any(|s| s == scope) {
            return Ok(());
        }
        Err(ServerError::forbidden("Insufficient scope"))
    }

    pub fn require_role(&self, need: Role) -> ServerResult<()> {
        if Role::allows(&self.role, &need) {
            return Ok(());
        }
        Err(ServerError::forbidden("Insufficient role"))
    }
}
