use std::sync::Arc;

use cart_shared::firmware::FirmwareSchema;
use mongodb::bson::{self, DateTime, doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::db::Mongo;
use crate::models::rfc3339;
use crate::response::{ServerError, ServerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub platform_id: ObjectId,

    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    /// Relative to the library root, e.g. `gba/bios`.
    pub file_path: String,
    pub file_size_bytes: u64,

    #[serde(default)]
    pub md5_hash: Option<String>,
    #[serde(default)]
    pub sha1_hash: Option<String>,
    /// True when the digests match a known-good firmware entry.
    pub is_verified: bool,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl FirmwareDoc {
    pub async fn upsert_from_scan(db: &Arc<Mongo>, firmware: FirmwareDoc) -> ServerResult<Self> {
        let mut fields = bson::to_document(&firmware)
            .map_err(|e| ServerError::internal_error(&format!("Serialize firmware: {}", e)))?;
        fields.remove("_id");
        fields.remove("created_at");

        let stored = db
            .firmware()
            .find_one_and_update(
                doc! { "platform_id": &firmware.platform_id, "file_name": &firmware.file_name },
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
            .ok_or_else(|| ServerError::internal_error("Firmware upsert returned nothing"))?;
        Ok(stored)
    }

    pub async fn get(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<Option<Self>> {
        let firmware = db.firmware().find_one(doc! { "_id": id }).await?;
        Ok(firmware)
    }

    pub async fn list(db: &Arc<Mongo>, platform_id: Option<&ObjectId>) -> ServerResult<Vec<Self>> {
        let query = match platform_id {
            Some(platform_id) => doc! { "platform_id": platform_id },
            None => doc! {},
        };
        let mut cursor = db
            .firmware()
            .find(query)
            .with_options(FindOptions::builder().sort(doc! { "file_name": 1 }).build())
            .await?;
        let mut firmware = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            firmware.push(entry);
        }
        Ok(firmware)
    }

    pub async fn purge_missing(
        db: &Arc<Mongo>,
        platform_id: &ObjectId,
        keep_file_names: &[String],
    ) -> ServerResult<u64> {
        let res = db
            .firmware()
            .delete_many(
                doc! { "platform_id": platform_id, "file_name": { "$nin": keep_file_names } },
            )
            .await?;
        Ok(res.deleted_count)
    }

    pub fn to_schema(self) -> FirmwareSchema {
        FirmwareSchema {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            platform_id: self.platform_id.to_string(),
            full_path: format!("{}/{}", self.file_path, self.file_name),
            file_name: self.file_name,
            file_name_no_tags: self.file_name_no_tags,
            file_name_no_ext: self.file_name_no_ext,
            file_extension: self.file_extension,
            file_path: self.file_path,
            file_size_bytes: self.file_size_bytes,
            md5_hash: self.md5_hash,
            sha1_hash: self.sha1_hash,
            is_verified: self.is_verified,
            created_at: rfc3339(&self.created_at),
            updated_at: rfc3339(&self.updated_at),
        }
    }
}
