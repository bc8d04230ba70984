use axum::{Form, Router, extract::State, response::IntoResponse, routing::post};
use axum_extra::TypedHeader;
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use cart_shared::auth::{MessageResponse, TokenRequestForm, TokenResponse};
use headers::{Authorization, authorization::Basic};

use crate::auth::claims::SESSION_COOKIE;
use crate::auth::{passwords, tokens};
use crate::models::user::UserDoc;
use crate::response::{ServerAppResult, ServerError, ServerResponse, ServerResult};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/token", post(post_token))
        .route("/login", post(post_login))
        .route("/logout", post(post_logout))
}

/// OAuth2-style token endpoint. Supports the `password` and
/// `refresh_token` grants; anything else is a 400.
async fn post_token(
    State(state): State<AppState>,
    Form(form): Form<TokenRequestForm>,
) -> ServerAppResult<TokenResponse> {
    let response = match form.grant_type.as_str() {
        "password" => password_grant(&state, &form).await?,
        "refresh_token" => refresh_grant(&state, &form).await?,
        other => {
            return Err(ServerError::bad_request(&format!(
                "Unsupported grant type: {}",
                other
            )));
        }
    };

    Ok(ServerResponse::builder().body(response).build())
}

async fn password_grant(state: &AppState, form: &TokenRequestForm) -> ServerResult<TokenResponse> {
    let username = form
        .username
        .as_deref()
        .ok_or_else(|| ServerError::bad_request("Missing username"))?;
    let password = form
        .password
        .as_deref()
        .ok_or_else(|| ServerError::bad_request("Missing password"))?;

    let user = UserDoc::find_by_username(&state.db, username)
        .await?
        .ok_or_else(|| ServerError::unauthorized("Invalid credentials"))?;
    if !user.enabled || !passwords::verify_password(password, &user.hashed_password) {
        return Err(ServerError::unauthorized("Invalid credentials"));
    }

    // An empty scope request means everything the role allows; a
    // non-empty one is narrowed to the role's scopes.
    let role_scopes = user.role.scopes();
    let granted: Vec<&str> = if form.scope.trim().is_empty() {
        role_scopes
    } else {
        form.scope
            .split_whitespace()
            .filter(|s| role_scopes.iter().any(|r| r == s))
            .collect()
    };
    let scopes = granted.join(" ");

    if let Some(id) = &user.id {
        UserDoc::mark_login(&state.db, id).await?;
    }

    Ok(TokenResponse {
        access_token: tokens::mint_access_token(
            &state.config.auth_secret_key,
            &user.username,
            &scopes,
        )?,
        refresh_token: tokens::mint_refresh_token(
            &state.config.auth_secret_key,
            &user.username,
            &scopes,
        )?,
        token_type: "bearer".to_string(),
        expires: tokens::ACCESS_TOKEN_TTL_SECS,
    })
}

/// Exchanges a refresh token for a fresh access token. The refresh token
/// itself is returned unchanged; scopes are carried over from the original
/// grant.
async fn refresh_grant(state: &AppState, form: &TokenRequestForm) -> ServerResult<TokenResponse> {
    let refresh_token = form
        .refresh_token
        .as_deref()
        .ok_or_else(|| ServerError::bad_request("Missing refresh token"))?;

    let claims = tokens::verify_token(
        &state.config.auth_secret_key,
        refresh_token,
        tokens::OAUTH_ISSUER,
    )?;
    if claims.token_type != tokens::TOKEN_TYPE_REFRESH {
        return Err(ServerError::invalid_token("Not a refresh token"));
    }

    let user = UserDoc::find_by_username(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| ServerError::unauthorized("Invalid credentials"))?;
    if !user.enabled {
        return Err(ServerError::unauthorized("Inactive user"));
    }

    Ok(TokenResponse {
        access_token: tokens::mint_access_token(
            &state.config.auth_secret_key,
            &user.username,
            &claims.scopes,
        )?,
        refresh_token: refresh_token.to_string(),
        token_type: "bearer".to_string(),
        expires: tokens::ACCESS_TOKEN_TTL_SECS,
    })
}

/// Trades Basic credentials for a signed session cookie.
async fn post_login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    TypedHeader(Authorization(basic)): TypedHeader<Authorization<Basic>>,
) -> ServerResult<impl IntoResponse> {
    let user = UserDoc::find_by_username(&state.db, basic.username())
        .await?
        .ok_or_else(|| ServerError::unauthorized("Invalid credentials"))?;
    if !user.enabled || !passwords::verify_password(basic.password(), &user.hashed_password) {
        return Err(ServerError::unauthorized("Invalid credentials"));
    }

    if let Some(id) = &user.id {
        UserDoc::mark_login(&state.db, id).await?;
    }

    let token = tokens::mint_session_token(&state.config.auth_secret_key, &user.username)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build();

    Ok((
        jar.add(cookie),
        ServerResponse::builder()
            .body(MessageResponse {
                msg: "Successfully logged in".to_string(),
            })
            .build(),
    ))
}

async fn post_logout(jar: SignedCookieJar) -> ServerResult<impl IntoResponse> {
    Ok((
        jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build()),
        ServerResponse::builder()
            .body(MessageResponse {
                msg: "Successfully logged out".to_string(),
            })
            .build(),
    ))
}
