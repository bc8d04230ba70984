use std::sync::Arc;

use cart_shared::roles::Role;
use cart_shared::users::{CreateUserBody, UpdateUserBody, UserSchema};
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::warn;

use crate::auth::passwords;
use crate::config::AppConfig;
use crate::db::Mongo;
use crate::models::rfc3339;
use crate::response::{ServerError, ServerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Stored lowercase; lookups fold case the same way.
    pub username: String,
    pub hashed_password: String,
    pub enabled: bool,
    pub role: Role,
    #[serde(default)]
    pub avatar_path: String,

    pub last_login: Option<DateTime>,
    pub last_active: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl UserDoc {
    pub async fn find_by_username(db: &Arc<Mongo>, username: &str) -> ServerResult<Option<Self>> {
        let user = db
            .users()
            .find_one(doc! { "username": username.to_lowercase() })
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<Option<Self>> {
        let user = db.users().find_one(doc! { "_id": id }).await?;
        Ok(user)
    }

    pub async fn list(db: &Arc<Mongo>) -> ServerResult<Vec<Self>> {
        let mut cursor = db
            .users()
            .find(doc! {})
            .with_options(FindOptions::builder().sort(doc! { "username": 1 }).build())
            .await?;
        let mut users = Vec::new();
        while let Some(user) = cursor.try_next().await? {
            users.push(user);
        }
        Ok(users)
    }

    pub async fn create(db: &Arc<Mongo>, body: &CreateUserBody) -> ServerResult<Self> {
        let username = body.username.to_lowercase();
        if Self::find_by_username(db, &username).await?.is_some() {
            return Err(ServerError::bad_request(&format!(
                "Username {} already exists",
                username
            )));
        }

        let now = DateTime::now();
        let user = UserDoc {
            id: Some(ObjectId::new()),
            username,
            hashed_password: passwords::hash_password(&body.password)?,
            enabled: true,
            role: body.role,
            avatar_path: String::new(),
            last_login: None,
            last_active: None,
            created_at: now,
            updated_at: now,
        };
        db.users().insert_one(user.clone()).await?;
        Ok(user)
    }

    pub async fn update(
        db: &Arc<Mongo>,
        id: &ObjectId,
        body: &UpdateUserBody,
    ) -> ServerResult<Self> {
        let mut fields = doc! {};

        if let Some(username) = &body.username {
            let username = username.to_lowercase();
            if let Some(existing) = Self::find_by_username(db, &username).await? {
                if existing.id.as_ref() != Some(id) {
                    return Err(ServerError::bad_request(&format!(
                        "Username {} already exists",
                        username
                    )));
                }
            }
            fields.insert("username", username);
        }
        if let Some(password) = &body.password {
            fields.insert("hashed_password", passwords::hash_password(password)?);
        }
        if let Some(role) = &body.role {
            fields.insert("role", role.as_str());
        }
        if let Some(enabled) = body.enabled {
            fields.insert("enabled", enabled);
        }
        fields.insert("updated_at", DateTime::now());

        let updated = db
            .users()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": fields })
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .ok_or_else(|| ServerError::not_found("User not found"))?;
        Ok(updated)
    }

    /// Deleting a user also drops their saves, states, screenshots and notes.
    pub async fn delete(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<()> {
        let owned = doc! { "user_id": id };
        db.saves().delete_many(owned.clone()).await?;
        db.states().delete_many(owned.clone()).await?;
        db.screenshots().delete_many(owned.clone()).await?;
        db.notes().delete_many(owned).await?;

        let res = db.users().delete_one(doc! { "_id": id }).await?;
        if res.deleted_count == 0 {
            return Err(ServerError::not_found("User not found"));
        }
        Ok(())
    }

    pub async fn set_avatar_path(db: &Arc<Mongo>, id: &ObjectId, path: &str) -> ServerResult<()> {
        db.users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "avatar_path": path, "updated_at": DateTime::now() } },
            )
            .await?;
        Ok(())
    }

    pub async fn mark_login(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<()> {
        let now = DateTime::now();
        db.users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "last_login": now, "last_active": now } },
            )
            .await?;
        Ok(())
    }

    /// Best-effort; called on every authenticated request.
    pub async fn touch_active(db: &Arc<Mongo>, id: &ObjectId) {
        let _ = db
            .users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "last_active": DateTime::now() } },
            )
            .await;
    }

    pub async fn admin_count(db: &Arc<Mongo>) -> ServerResult<u64> {
        let count = db
            .users()
            .count_documents(doc! { "role": "admin", "enabled": true })
            .await?;
        Ok(count)
    }

    /// Seeds an admin account from the environment on an empty install.
    pub async fn create_default_admin(db: &Arc<Mongo>, config: &Arc<AppConfig>) -> ServerResult<()> {
        if db.users().count_documents(doc! {}).await? > 0 {
            return Ok(());
        }

        let body = CreateUserBody {
            username: config.admin_username.clone(),
            password: config.admin_password.clone(),
            role: Role::Admin,
        };
        Self::create(db, &body).await?;
        warn!(
            "Created default admin user '{}'; change its password",
            config.admin_username.to_lowercase()
        );
        Ok(())
    }

    pub fn to_schema(self) -> UserSchema {
        UserSchema {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            username: self.username,
            enabled: self.enabled,
            role: self.role,
            oauth_scopes: self.role.scopes().iter().map(|s| s.to_string()).collect(),
            avatar_path: self.avatar_path,
            last_login: self.last_login.as_ref().map(rfc3339),
            last_active: self.last_active.as_ref().map(rfc3339),
            created_at: rfc3339(&self.created_at),
            updated_at: rfc3339(&self.updated_at),
        }
    }
}
