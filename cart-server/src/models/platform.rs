use std::sync::Arc;

use cart_shared::platform::PlatformSchema;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::info;

use crate::db::Mongo;
use crate::models::rfc3339;
use crate::response::{ServerError, ServerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Canonical platform slug, after applying the config binding.
    pub slug: String,
    /// Folder name as found on disk.
    pub fs_slug: String,
    pub name: String,

    #[serde(default)]
    pub igdb_id: Option<i64>,
    #[serde(default)]
    pub moby_id: Option<i64>,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl PlatformDoc {
    /// Upserts by `fs_slug`, keeping metadata source ids already matched.
    pub async fn upsert_from_scan(
        db: &Arc<Mongo>,
        fs_slug: &str,
        slug: &str,
        name: &str,
        igdb_id: Option<i64>,
        moby_id: Option<i64>,
    ) -> ServerResult<Self> {
        let mut fields = doc! {
            "slug": slug,
            "name": name,
            "updated_at": DateTime::now(),
        };
        if let Some(igdb_id) = igdb_id {
            fields.insert("igdb_id", igdb_id);
        }
        if let Some(moby_id) = moby_id {
            fields.insert("moby_id", moby_id);
        }

        let platform = db
            .platforms()
            .find_one_and_update(
                doc! { "fs_slug": fs_slug },
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
            .ok_or_else(|| ServerError::internal_error("Platform upsert returned nothing"))?;
        Ok(platform)
    }

    pub async fn list(db: &Arc<Mongo>) -> ServerResult<Vec<Self>> {
        let mut cursor = db
            .platforms()
            .find(doc! {})
            .with_options(FindOptions::builder().sort(doc! { "name": 1 }).build())
            .await?;
        let mut platforms = Vec::new();
        while let Some(platform) = cursor.try_next().await? {
            platforms.push(platform);
        }
        Ok(platforms)
    }

    pub async fn get(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<Option<Self>> {
        let platform = db.platforms().find_one(doc! { "_id": id }).await?;
        Ok(platform)
    }

    pub async fn get_by_fs_slug(db: &Arc<Mongo>, fs_slug: &str) -> ServerResult<Option<Self>> {
        let platform = db.platforms().find_one(doc! { "fs_slug": fs_slug }).await?;
        Ok(platform)
    }

    pub async fn rom_count(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<u64> {
        let count = db
            .roms()
            .count_documents(doc! { "platform_id": id })
            .await?;
        Ok(count)
    }

    /// Removes the platform and everything hanging off it.
    pub async fn delete_cascade(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<()> {
        let rom_ids = db.roms().distinct("_id", doc! { "platform_id": id }).await?;

        if !rom_ids.is_empty() {
            let rom_filter = doc! { "rom_id": { "$in": &rom_ids } };
            db.saves().delete_many(rom_filter.clone()).await?;
            db.states().delete_many(rom_filter.clone()).await?;
            db.screenshots().delete_many(rom_filter.clone()).await?;
            db.notes().delete_many(rom_filter).await?;
        }
        db.roms().delete_many(doc! { "platform_id": id }).await?;
        db.firmware().delete_many(doc! { "platform_id": id }).await?;

        let res = db.platforms().delete_one(doc! { "_id": id }).await?;
        if res.deleted_count == 0 {
            return Err(ServerError::not_found("Platform not found"));
        }
        Ok(())
    }

    /// Drops platforms whose folder is gone from the library.
    pub async fn purge_missing(db: &Arc<Mongo>, keep_fs_slugs: &[String]) -> ServerResult<u64> {
        let mut cursor = db
            .platforms()
            .find(doc! { "fs_slug": { "$nin": keep_fs_slugs } })
            .await?;
        let mut purged = 0;
        while let Some(platform) = cursor.try_next().await? {
            if let Some(id) = &platform.id {
                info!("Purging platform {} ({})", platform.name, platform.fs_slug);
                Self::delete_cascade(db, id).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    pub fn to_schema(self, rom_count: u64) -> PlatformSchema {
        PlatformSchema {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            igdb_id: self.igdb_id,
            moby_id: self.moby_id,
            slug: self.slug,
            fs_slug: self.fs_slug,
            name: self.name,
            rom_count,
            created_at: rfc3339(&self.created_at),
            updated_at: rfc3339(&self.updated_at),
        }
    }
}
