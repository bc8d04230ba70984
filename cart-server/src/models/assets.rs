use std::sync::Arc;

use cart_shared::assets::{SaveSchema, ScreenshotSchema, StateSchema};
use mongodb::bson::{self, DateTime, doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::db::Mongo;
use crate::models::rfc3339;
use crate::response::{ServerError, ServerResult};

/// Asset files live under the assets root at
/// `{kind}/{platform_slug}/{rom_file_name_no_ext}/{username}/{file_name}`;
/// `file_path` stores everything up to the file name.
fn download_path(file_path: &str, file_name: &str, updated_at: &DateTime) -> String {
    format!(
        "/api/raw/assets/{}/{}?timestamp={}",
        file_path,
        file_name,
        updated_at.timestamp_millis()
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub rom_id: ObjectId,
    pub user_id: ObjectId,

    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    pub file_path: String,
    pub file_size_bytes: u64,

    #[serde(default)]
    pub emulator: Option<String>,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl SaveDoc {
    pub async fn upsert(db: &Arc<Mongo>, save: SaveDoc) -> ServerResult<Self> {
        let mut fields = bson::to_document(&save)
            .map_err(|e| ServerError::internal_error(&format!("Serialize save: {}", e)))?;
        fields.remove("_id");
        fields.remove("created_at");

        let stored = db
            .saves()
            .find_one_and_update(
                doc! {
                    "rom_id": &save.rom_id,
                    "user_id": &save.user_id,
                    "file_name": &save.file_name,
                },
                doc! {
                    "$set": fields,
                    "$setOnInsert": { "created_at": DateTime::now() },
                },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .ok_or_else(|| ServerError::internal_error("Save upsert returned nothing"))?;
        Ok(stored)
    }

    pub async fn get(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<Option<Self>> {
        let save = db.saves().find_one(doc! { "_id": id }).await?;
        Ok(save)
    }

    pub async fn list_for_rom(
        db: &Arc<Mongo>,
        rom_id: &ObjectId,
        user_id: &ObjectId,
    ) -> ServerResult<Vec<Self>> {
        let mut cursor = db
            .saves()
            .find(doc! { "rom_id": rom_id, "user_id": user_id })
            .with_options(FindOptions::builder().sort(doc! { "file_name": 1 }).build())
            .await?;
        let mut saves = Vec::new();
        while let Some(save) = cursor.try_next().await? {
            saves.push(save);
        }
        Ok(saves)
    }

    pub async fn delete(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<()> {
        let res = db.saves().delete_one(doc! { "_id": id }).await?;
        if res.deleted_count == 0 {
            return Err(ServerError::not_found("Save not found"));
        }
        Ok(())
    }

    pub fn to_schema(self) -> SaveSchema {
        SaveSchema {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            rom_id: self.rom_id.to_string(),
            user_id: self.user_id.to_string(),
            full_path: format!("{}/{}", self.file_path, self.file_name),
            download_path: download_path(&self.file_path, &self.file_name, &self.updated_at),
            file_name: self.file_name,
            file_name_no_tags: self.file_name_no_tags,
            file_name_no_ext: self.file_name_no_ext,
            file_extension: self.file_extension,
            file_path: self.file_path,
            file_size_bytes: self.file_size_bytes,
            emulator: self.emulator,
            created_at: rfc3339(&self.created_at),
            updated_at: rfc3339(&self.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub rom_id: ObjectId,
    pub user_id: ObjectId,

    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    pub file_path: String,
    pub file_size_bytes: u64,

    #[serde(default)]
    pub emulator: Option<String>,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl StateDoc {
    pub async fn upsert(db: &Arc<Mongo>, state: StateDoc) -> ServerResult<Self> {
        let mut fields = bson::to_document(&state)
            .map_err(|e| ServerError::internal_error(&format!("Serialize state: {}", e)))?;
        fields.remove("_id");
        fields.remove("created_at");

        let stored = db
            .states()
            .find_one_and_update(
                doc! {
                    "rom_id": &state.rom_id,
                    "user_id": &state.user_id,
                    "file_name": &state.file_name,
                },
                doc! {
                    "$set": fields,
                    "$setOnInsert": { "created_at": DateTime::now() },
                },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .ok_or_else(|| ServerError::internal_error("State upsert returned nothing"))?;
        Ok(stored)
    }

    pub async fn get(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<Option<Self>> {
        let state = db.states().find_one(doc! { "_id": id }).await?;
        Ok(state)
    }

    pub async fn list_for_rom(
        db: &Arc<Mongo>,
        rom_id: &ObjectId,
        user_id: &ObjectId,
    ) -> ServerResult<Vec<Self>> {
        let mut cursor = db
            .states()
            .find(doc! { "rom_id": rom_id, "user_id": user_id })
            .with_options(FindOptions::builder().sort(doc! { "file_name": 1 }).build())
            .await?;
        let mut states = Vec::new();
        while let Some(state) = cursor.try_next().await? {
            states.push(state);
        }
        Ok(states)
    }

    pub async fn delete(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<()> {
        let res = db.states().delete_one(doc! { "_id": id }).await?;
        if res.deleted_count == 0 {
            return Err(ServerError::not_found("State not found"));
        }
        Ok(())
    }

    pub fn to_schema(self) -> StateSchema {
        StateSchema {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            rom_id: self.rom_id.to_string(),
            user_id: self.user_id.to_string(),
            full_path: format!("{}/{}", self.file_path, self.file_name),
            download_path: download_path(&self.file_path, &self.file_name, &self.updated_at),
            file_name: self.file_name,
            file_name_no_tags: self.file_name_no_tags,
            file_name_no_ext: self.file_name_no_ext,
            file_extension: self.file_extension,
            file_path: self.file_path,
            file_size_bytes: self.file_size_bytes,
            emulator: self.emulator,
            created_at: rfc3339(&self.created_at),
            updated_at: rfc3339(&self.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub rom_id: ObjectId,
    pub user_id: ObjectId,

    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    pub file_path: String,
    pub file_size_bytes: u64,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ScreenshotDoc {
    pub async fn upsert(db: &Arc<Mongo>, screenshot: ScreenshotDoc) -> ServerResult<Self> {
        let mut fields = bson::to_document(&screenshot)
            .map_err(|e| ServerError::internal_error(&format!("Serialize screenshot: {}", e)))?;
        fields.remove("_id");
        fields.remove("created_at");

        let stored = db
            .screenshots()
            .find_one_and_update(
                doc! {
                    "rom_id": &screenshot.rom_id,
                    "user_id": &screenshot.user_id,
                    "file_name": &screenshot.file_name,
                },
                doc! {
                    "$set": fields,
                    "$setOnInsert": { "created_at": DateTime::now() },
                },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .ok_or_else(|| ServerError::internal_error("Screenshot upsert returned nothing"))?;
        Ok(stored)
    }

    pub async fn get(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<Option<Self>> {
        let screenshot = db.screenshots().find_one(doc! { "_id": id }).await?;
        Ok(screenshot)
    }

    pub async fn list_for_rom(
        db: &Arc<Mongo>,
        rom_id: &ObjectId,
        user_id: &ObjectId,
    ) -> ServerResult<Vec<Self>> {
        let mut cursor = db
            .screenshots()
            .find(doc! { "rom_id": rom_id, "user_id": user_id })
            .with_options(FindOptions::builder().sort(doc! { "file_name": 1 }).build())
            .await?;
        let mut screenshots = Vec::new();
        while let Some(screenshot) = cursor.try_next().await? {
            screenshots.push(screenshot);
        }
        Ok(screenshots)
    }

    pub async fn delete(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<()> {
        let res = db.screenshots().delete_one(doc! { "_id": id }).await?;
        if res.deleted_count == 0 {
            return Err(ServerError::not_found("Screenshot not found"));
        }
        Ok(())
    }

    pub fn to_schema(self) -> ScreenshotSchema {
        ScreenshotSchema {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            rom_id: self.rom_id.to_string(),
            user_id: self.user_id.to_string(),
            full_path: format!("{}/{}", self.file_path, self.file_name),
            download_path: download_path(&self.file_path, &self.file_name, &self.updated_at),
            file_name: self.file_name,
            file_name_no_tags: self.file_name_no_tags,
            file_name_no_ext: self.file_name_no_ext,
            file_extension: self.file_extension,
            file_path: self.file_path,
            file_size_bytes: self.file_size_bytes,
            created_at: rfc3339(&self.created_at),
            updated_at: rfc3339(&self.updated_at),
        }
    }
}
