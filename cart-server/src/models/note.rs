use std::sync::Arc;

use cart_shared::rom::{NoteSchema, UpdateNoteBody};
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use serde::{Deserialize, Serialize};

use crate::db::Mongo;
use crate::models::rfc3339;
use crate::response::{ServerError, ServerResult};

/// One free-form markdown note per (rom, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub rom_id: ObjectId,
    pub user_id: ObjectId,
    pub user_username: String,

    #[serde(default)]
    pub raw_markdown: String,
    #[serde(default)]
    pub is_public: bool,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl NoteDoc {
    pub async fn upsert_for(
        db: &Arc<Mongo>,
        rom_id: &ObjectId,
        user_id: &ObjectId,
        username: &str,
        body: &UpdateNoteBody,
    ) -> ServerResult<Self> {
        let mut fields = doc! {
            "user_username": username,
            "updated_at": DateTime::now(),
        };
        if let Some(raw_markdown) = &body.raw_markdown {
            fields.insert("raw_markdown", raw_markdown);
        }
        if let Some(is_public) = body.is_public {
            fields.insert("is_public", is_public);
        }

        let note = db
            .notes()
            .find_one_and_update(
                doc! { "rom_id": rom_id, "user_id": user_id },
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
            .ok_or_else(|| ServerError::internal_error("Note upsert returned nothing"))?;
        Ok(note)
    }

    pub async fn get_for(
        db: &Arc<Mongo>,
        rom_id: &ObjectId,
        user_id: &ObjectId,
    ) -> ServerResult<Option<Self>> {
        let note = db
            .notes()
            .find_one(doc! { "rom_id": rom_id, "user_id": user_id })
            .await?;
        Ok(note)
    }

    pub async fn delete_for(
        db: &Arc<Mongo>,
        rom_id: &ObjectId,
        user_id: &ObjectId,
    ) -> ServerResult<()> {
        let res = db
            .notes()
            .delete_one(doc! { "rom_id": rom_id, "user_id": user_id })
            .await?;
        if res.deleted_count == 0 {
            return Err(ServerError::not_found("Note not found"));
        }
        Ok(())
    }

    pub fn to_schema(self) -> NoteSchema {
        NoteSchema {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            rom_id: self.rom_id.to_string(),
            user_id: self.user_id.to_string(),
            user_username: self.user_username,
            raw_markdown: self.raw_markdown,
            is_public: self.is_public,
            last_edited_at: rfc3339(&self.updated_at),
        }
    }
}
