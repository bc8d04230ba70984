use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};

use crate::models::assets::{SaveDoc, ScreenshotDoc, StateDoc};
use crate::models::firmware::FirmwareDoc;
use crate::models::note::NoteDoc;
use crate::models::platform::PlatformDoc;
use crate::models::rom::RomDoc;
use crate::models::user::UserDoc;

pub struct Mongo {
    pub db: Database,
}

impl Mongo {
    pub async fn new(uri: &str, db_name: &str) -> mongodb::error::Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        Ok(Self { db })
    }

    pub fn col<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn users(&self) -> Collection<UserDoc> {
        self.col("users")
    }

    pub fn platforms(&self) -> Collection<PlatformDoc> {
        self.col("platforms")
    }

    pub fn roms(&self) -> Collection<RomDoc> {
        self.col("roms")
    }

    pub fn firmware(&self) -> Collection<FirmwareDoc> {
        self.col("firmware")
    }

    pub fn saves(&self) -> Collection<SaveDoc> {
        self.col("saves")
    }

    pub fn states(&self) -> Collection<StateDoc> {
        self.col("states")
    }

    pub fn screenshots(&self) -> Collection<ScreenshotDoc> {
        self.col("screenshots")
    }

    pub fn notes(&self) -> Collection<NoteDoc> {
        self.col("notes")
    }

    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        self.platforms()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "fs_slug": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.platforms()
            .create_index(IndexModel::builder().keys(doc! { "slug": 1 }).build())
            .await?;

        self.roms()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "platform_id": 1, "file_name": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.roms()
            .create_index(IndexModel::builder().keys(doc! { "platform_id": 1 }).build())
            .await?;
        self.roms()
            .create_index(IndexModel::builder().keys(doc! { "name": 1 }).build())
            .await?;
        // Sibling lookup during scans: same tag-stripped name on the
        // same platform.
        self.roms()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "platform_id": 1, "file_name_no_tags": 1 })
                    .build(),
            )
            .await?;

        self.firmware()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "platform_id": 1, "file_name": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        self.saves()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "rom_id": 1, "user_id": 1, "file_name": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.saves()
            .create_index(IndexModel::builder().keys(doc! { "rom_id": 1 }).build())
            .await?;

        self.states()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "rom_id": 1, "user_id": 1, "file_name": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.states()
            .create_index(IndexModel::builder().keys(doc! { "rom_id": 1 }).build())
            .await?;

        self.screenshots()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "rom_id": 1, "user_id": 1, "file_name": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.screenshots()
            .create_index(IndexModel::builder().keys(doc! { "rom_id": 1 }).build())
            .await?;

        self.notes()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "rom_id": 1, "user_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        Ok(())
    }
}
