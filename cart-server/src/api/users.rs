use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, post},
};
use cart_shared::roles::Role;
use cart_shared::users::{CreateUserBody, UpdateUserBody, UserSchema};
use mongodb::bson::oid::ObjectId;

use crate::auth::claims::Claims;
use crate::models::user::UserDoc;
use crate::response::{ServerAppResult, ServerError, ServerResponse};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/users", get(get_users).post(add_user))
        .route("/users/me", get(get_current_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/avatar", post(upload_avatar))
}

async fn get_users(claims: Claims, State(state): State<AppState>) -> ServerAppResult<Vec<UserSchema>> {
    claims.require_scope("users.read")?;

    let users = UserDoc::list(&state.db)
        .await?
        .into_iter()
        .map(UserDoc::to_schema)
        .collect();
    Ok(ServerResponse::builder().body(users).build())
}

async fn get_current_user(claims: Claims, State(state): State<AppState>) -> ServerAppResult<UserSchema> {
    claims.require_scope("me.read")?;

    let user = UserDoc::find_by_id(&state.db, &claims.user_id)
        .await?
        .ok_or_else(|| ServerError::not_found("User not found"))?;
    Ok(ServerResponse::builder().body(user.to_schema()).build())
}

async fn get_user(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<UserSchema> {
    claims.require_scope("users.read")?;

    let id = ObjectId::parse_str(&id)?;
    let user = UserDoc::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("User not found"))?;
    Ok(ServerResponse::builder().body(user.to_schema()).build())
}

async fn add_user(
    claims: Claims,
    State(state): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> ServerAppResult<UserSchema> {
    claims.require_scope("users.write")?;

    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ServerError::bad_request("Username and password are required"));
    }

    let user = UserDoc::create(&state.db, &body).await?;
    Ok(ServerResponse::builder()
        .body(user.to_schema())
        .created()
        .build())
}

async fn update_user(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<UpdateUserBody>,
) -> ServerAppResult<UserSchema> {
    claims.require_scope("users.write")?;

    let id = ObjectId::parse_str(&id)?;

    // Admins cannot demote or disable themselves; those fields are
    // silently dropped rather than rejected.
    if id == claims.user_id {
        body.role = None;
        if body.enabled == Some(false) {
            body.enabled = None;
        }
    }

    let user = UserDoc::update(&state.db, &id, &body).await?;
    Ok(ServerResponse::builder().body(user.to_schema()).build())
}

async fn delete_user(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<()> {
    claims.require_scope("users.write")?;

    let id = ObjectId::parse_str(&id)?;
    if id == claims.user_id {
        return Err(ServerError::bad_request("You cannot delete yourself"));
    }

    let target = UserDoc::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("User not found"))?;
    if target.role == Role::Admin && UserDoc::admin_count(&state.db).await? <= 1 {
        return Err(ServerError::bad_request(
            "You cannot delete the last admin user",
        ));
    }

    UserDoc::delete(&state.db, &id).await?;
    Ok(ServerResponse::builder().no_content().build())
}

/// Stores the uploaded image under the assets tree and records its
/// relative path on the user document.
async fn upload_avatar(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ServerAppResult<UserSchema> {
    let id = ObjectId::parse_str(&id)?;
    if id == claims.user_id {
        claims.require_scope("me.write")?;
    } else {
        claims.require_scope("users.write")?;
    }

    let user = UserDoc::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("User not found"))?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::bad_request(&format!("Invalid multipart body: {}", e)))?
        .ok_or_else(|| ServerError::bad_request("Missing avatar file"))?;

    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| super::assets::safe_upload_name(n))
        .ok_or_else(|| ServerError::bad_request("Missing or invalid avatar file name"))?;
    let data = field
        .bytes()
        .await
        .map_err(|e| ServerError::bad_request(&format!("Invalid multipart body: {}", e)))?;

    let rel_path = format!("users/{}/profile/{}", user.username, file_name);
    let abs_path = state.config.assets_path.join(&rel_path);
    if let Some(parent) = abs_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&abs_path, &data).await?;

    UserDoc::set_avatar_path(&state.db, &id, &rel_path).await?;
    let user = UserDoc::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("User not found"))?;
    Ok(ServerResponse::builder().body(user.to_schema()).build())
}
