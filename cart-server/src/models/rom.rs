use std::sync::Arc;

use cart_shared::assets::{SaveSchema, ScreenshotSchema, StateSchema};
use cart_shared::rom::{RomFile, RomSchema, UpdateRomBody};
use mongodb::bson::{self, DateTime, doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::StreamExt;

use crate::db::Mongo;
use crate::models::rfc3339;
use crate::response::{ServerError, ServerResult};
use crate::scanner::filename;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RomDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub igdb_id: Option<i64>,
    #[serde(default)]
    pub moby_id: Option<i64>,

    pub platform_id: ObjectId,
    pub platform_slug: String,
    pub platform_name: String,

    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    /// Relative to the library root, e.g. `n64/roms`.
    pub file_path: String,
    pub file_size_bytes: u64,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url_cover: String,
    #[serde(default)]
    pub url_screenshots: Vec<String>,

    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub multi: bool,
    #[serde(default)]
    pub files: Vec<RomFile>,

    #[serde(default)]
    pub igdb_metadata: Option<Value>,
    #[serde(default)]
    pub moby_metadata: Option<Value>,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Default)]
pub struct RomFilter {
    pub platform_id: Option<ObjectId>,
    pub search_term: Option<String>,
}

impl RomFilter {
    fn to_query(&self) -> mongodb::bson::Document {
        let mut query = doc! {};
        if let Some(platform_id) = &self.platform_id {
            query.insert("platform_id", platform_id);
        }
        if let Some(term) = &self.search_term {
            let escaped = regex::escape(term);
            query.insert(
                "$or",
                vec![
                    doc! { "file_name_no_tags": { "$regex": &escaped, "$options": "i" } },
                    doc! { "name": { "$regex": &escaped, "$options": "i" } },
                ],
            );
        }
        query
    }
}

impl RomDoc {
    /// Upserts by `(platform_id, file_name)`. Identity survives rescans:
    /// `_id` and `created_at` are never overwritten.
    pub async fn upsert_from_scan(db: &Arc<Mongo>, rom: RomDoc) -> ServerResult<Self> {
        let mut fields = bson::to_document(&rom)
            .map_err(|e| ServerError::internal_error(&format!("Serialize rom: {}", e)))?;
        fields.remove("_id");
        fields.remove("created_at");

        let stored = db
            .roms()
            .find_one_and_update(
                doc! { "platform_id": &rom.platform_id, "file_name": &rom.file_name },
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
            .ok_or_else(|| ServerError::internal_error("Rom upsert returned nothing"))?;
        Ok(stored)
    }

    pub async fn get(db: &Arc<Mongo>, id: &ObjectId) -> ServerResult<Option<Self>> {
        let rom = db.roms().find_one(doc! { "_id": id }).await?;
        Ok(rom)
    }

    pub async fn get_by_filename(
        db: &Arc<Mongo>,
        platform_id: &ObjectId,
        file_name: &str,
    ) -> ServerResult<Option<Self>> {
        let rom = db
            .roms()
            .find_one(doc! { "platform_id": platform_id, "file_name": file_name })
            .await?;
        Ok(rom)
    }

    pub async fn list(
        db: &Arc<Mongo>,
        filter: &RomFilter,
        offset: u64,
        limit: u32,
    ) -> ServerResult<(Vec<Self>, u64)> {
        let query = filter.to_query();
        let total = db.roms().count_documents(query.clone()).await?;

        let mut cursor = db
            .roms()
            .find(query)
            .with_options(
                FindOptions::builder()
                    .sort(doc! { "file_name_no_tags": 1 })
                    .skip(Some(offset))
                    .limit(Some(limit as i64))
                    .build(),
            )
            .await?;
        let mut roms = Vec::new();
        while let Some(rom) = cursor.try_next().await? {
            roms.push(rom);
        }
        Ok((roms, total))
    }

    /// Manual edit from the API. A changed file name re-derives the parsed
    /// name fields and tags; the caller renames the file on disk first.
    pub async fn apply_update(
        db: &Arc<Mongo>,
        id: &ObjectId,
        body: &UpdateRomBody,
    ) -> ServerResult<Self> {
        let mut fields = doc! {};

        if let Some(file_name) = &body.file_name {
            let parsed = filename::parse(file_name);
            fields.insert("file_name", file_name);
            fields.insert("file_name_no_tags", parsed.no_tags);
            fields.insert("file_name_no_ext", parsed.no_ext);
            fields.insert("file_extension", parsed.extension);
            fields.insert("revision", parsed.revision);
            fields.insert("regions", parsed.regions);
            fields.insert("languages", parsed.languages);
            fields.insert("tags", parsed.tags);
        }
        if let Some(name) = &body.name {
            fields.insert("name", name);
        }
        if let Some(summary) = &body.summary {
            fields.insert("summary", summary);
        }
        if let Some(url_cover) = &body.url_cover {
            fields.insert("url_cover", url_cover);
        }
        fields.insert("updated_at", DateTime::now());

        let updated = db
            .roms()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": fields })
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .ok_or_else(|| ServerError::not_found("Rom not found"))?;
        Ok(updated)
    }

    pub async fn bulk_delete(db: &Arc<Mongo>, ids: &[ObjectId]) -> ServerResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let rom_filter = doc! { "rom_id": { "$in": ids } };
        db.saves().delete_many(rom_filter.clone()).await?;
        db.states().delete_many(rom_filter.clone()).await?;
        db.screenshots().delete_many(rom_filter.clone()).await?;
        db.notes().delete_many(rom_filter).await?;

        let res = db.roms().delete_many(doc! { "_id": { "$in": ids } }).await?;
        Ok(res.deleted_count)
    }

    /// Drops roms of a platform whose files are gone from the library.
    pub async fn purge_missing(
        db: &Arc<Mongo>,
        platform_id: &ObjectId,
        keep_file_names: &[String],
    ) -> ServerResult<u64> {
        let gone = db
            .roms()
            .distinct(
                "_id",
                doc! { "platform_id": platform_id, "file_name": { "$nin": keep_file_names } },
            )
            .await?;
        let ids: Vec<ObjectId> = gone
            .into_iter()
            .filter_map(|b| b.as_object_id())
            .collect();
        Self::bulk_delete(db, &ids).await
    }

    /// Another dump of the same game on the same platform that already
    /// carries a metadata match, used to reuse it instead of hitting the
    /// APIs again. Matches on the tag-stripped file name, which is what
    /// two dumps of one game share.
    pub async fn sibling_with_metadata(
        db: &Arc<Mongo>,
        platform_id: &ObjectId,
        file_name_no_tags: &str,
    ) -> ServerResult<Option<Self>> {
        let sibling = db
            .roms()
            .find_one(sibling_query(platform_id, file_name_no_tags))
            .await?;
        Ok(sibling)
    }

    /// Sum of `file_size_bytes` over the whole library.
    pub async fn total_size(db: &Arc<Mongo>) -> ServerResult<u64> {
        let pipeline = vec![doc! {
            "$group": { "_id": null, "total": { "$sum": "$file_size_bytes" } }
        }];
        let mut cursor = db.roms().aggregate(pipeline).await?;
        if let Some(group) = cursor.try_next().await? {
            // Mongo picks the numeric type of the sum from its inputs.
            let total = match group.get("total") {
                Some(bson::Bson::Int64(v)) => *v,
                Some(bson::Bson::Int32(v)) => *v as i64,
                Some(bson::Bson::Double(v)) => *v as i64,
                _ => 0,
            };
            return Ok(total.max(0) as u64);
        }
        Ok(0)
    }

    pub fn to_schema(
        self,
        user_saves: Vec<SaveSchema>,
        user_states: Vec<StateSchema>,
        user_screenshots: Vec<ScreenshotSchema>,
    ) -> RomSchema {
        let id = self.id.map(|id| id.to_string()).unwrap_or_default();
        RomSchema {
            download_path: format!("/api/roms/{}/content", id),
            id,
            igdb_id: self.igdb_id,
            moby_id: self.moby_id,
            platform_id: self.platform_id.to_string(),
            platform_slug: self.platform_slug,
            platform_name: self.platform_name,
            full_path: format!("{}/{}", self.file_path, self.file_name),
            file_name: self.file_name,
            file_name_no_tags: self.file_name_no_tags,
            file_name_no_ext: self.file_name_no_ext,
            file_extension: self.file_extension,
            file_path: self.file_path,
            file_size_bytes: self.file_size_bytes,
            name: self.name,
            slug: self.slug,
            summary: self.summary,
            url_cover: self.url_cover,
            url_screenshots: self.url_screenshots,
            revision: self.revision,
            regions: self.regions,
            languages: self.languages,
            tags: self.tags,
            multi: self.multi,
            files: self.files,
            igdb_metadata: self.igdb_metadata,
            moby_metadata: self.moby_metadata,
            user_saves,
            user_states,
            user_screenshots,
            created_at: rfc3339(&self.created_at),
            updated_at: rfc3339(&self.updated_at),
        }
    }
}

fn sibling_query(platform_id: &ObjectId, file_name_no_tags: &str) -> bson::Document {
    doc! {
        "platform_id": platform_id,
        "file_name_no_tags": file_name_no_tags,
        "$or": [
            { "igdb_id": { "$ne": bson::Bson::Null } },
            { "moby_id": { "$ne": bson::Bson::Null } },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_lookup_filters_on_name_and_metadata_presence() {
        let platform_id = ObjectId::new();
        let query = sibling_query(&platform_id, "Super Mario 64");

        assert_eq!(query.get_object_id("platform_id").unwrap(), platform_id);
        assert_eq!(query.get_str("file_name_no_tags").unwrap(), "Super Mario 64");

        // Only roms that already carry a match qualify as siblings.
        let or = query.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
        let keys: Vec<&str> = or
            .iter()
            .filter_map(|b| b.as_document())
            .flat_map(|d| d.keys().map(String::as_str))
            .collect();
        assert_eq!(keys, vec!["igdb_id", "moby_id"]);
    }
}
