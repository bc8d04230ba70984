//! IGDB client. Auth is a Twitch client-credentials token, cached until
//! shortly before expiry; queries use IGDB's Apicalypse body syntax.

use std::time::{Duration, Instant};

use cart_shared::search::SearchRomSchema;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::response::{ServerError, ServerResult};

const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const IGDB_API_URL: &str = "https://api.igdb.com/v4";
const GAME_FIELDS: &str = "id, name, slug, summary, cover.url, screenshots.url, \
     genres.name, franchises.name, involved_companies.company.name, \
     alternative_names.name, first_release_date";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct IgdbClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TwitchToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct IgdbPlatform {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct IgdbImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct IgdbNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IgdbCompany {
    company: IgdbNamed,
}

#[derive(Debug, Deserialize)]
struct IgdbGame {
    id: i64,
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    cover: Option<IgdbImage>,
    #[serde(default)]
    screenshots: Vec<IgdbImage>,
    #[serde(default)]
    genres: Vec<IgdbNamed>,
    #[serde(default)]
    franchises: Vec<IgdbNamed>,
    #[serde(default)]
    involved_companies: Vec<IgdbCompany>,
    #[serde(default)]
    alternative_names: Vec<IgdbNamed>,
    #[serde(default)]
    first_release_date: Option<i64>,
}

/// IGDB serves protocol-relative thumbnail urls; swap in the big cover
/// size and a scheme.
fn full_image_url(url: &str, size: &str) -> String {
    let url = url.replace("t_thumb", size);
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url
    }
}

/// A matched game: the public search shape plus the flattened metadata
/// blob stored on the rom (`igdb_metadata`).
#[derive(Debug)]
pub struct IgdbMatch {
    pub schema: SearchRomSchema,
    pub metadata: serde_json::Value,
}

impl IgdbGame {
    fn into_match(self) -> IgdbMatch {
        let names = |list: Vec<IgdbNamed>| -> Vec<String> {
            list.into_iter().map(|n| n.name).collect()
        };
        let metadata = serde_json::json!({
            "genres": names(self.genres),
            "franchises": names(self.franchises),
            "companies": self
                .involved_companies
                .into_iter()
                .map(|c| c.company.name)
                .collect::<Vec<_>>(),
            "alternative_names": names(self.alternative_names),
            "first_release_date": self.first_release_date,
        });

        let mut schema = SearchRomSchema {
            igdb_id: Some(self.id),
            moby_id: None,
            slug: self.slug,
            name: self.name,
            summary: self.summary,
            igdb_url_cover: self
                .cover
                .map(|c| full_image_url(&c.url, "t_cover_big"))
                .unwrap_or_default(),
            moby_url_cover: String::new(),
            url_screenshots: self
                .screenshots
                .iter()
                .map(|s| full_image_url(&s.url, "t_screenshot_huge"))
                .collect(),
        };
        if schema.slug.is_empty() {
            schema.slug = schema.name.to_lowercase().replace(' ', "-");
        }
        IgdbMatch { schema, metadata }
    }
}

impl IgdbClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> ServerResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing Twitch client-credentials token");
        let token: TwitchToken = self
            .http
            .post(TWITCH_TOKEN_URL)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|_| ServerError::internal_error("IGDB credentials were rejected"))?
            .json()
            .await?;

        let access_token = token.access_token.clone();
        // Renew a minute early so in-flight queries never race expiry.
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60));
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: String,
    ) -> ServerResult<Vec<T>> {
        let token = self.access_token().await?;
        let results = self
            .http
            .post(format!("{}/{}", IGDB_API_URL, endpoint))
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(results)
    }

    pub async fn platform_by_slug(&self, slug: &str) -> ServerResult<Option<IgdbPlatform>> {
        let body = format!(
            "fields id, name; where slug = \"{}\"; limit 1;",
            slug.replace('"', "")
        );
        let mut platforms: Vec<IgdbPlatform> = self.query("platforms", body).await?;
        Ok(platforms.drain(..).next())
    }

    pub async fn search_roms(
        &self,
        term: &str,
        platform_id: Option<i64>,
    ) -> ServerResult<Vec<SearchRomSchema>> {
        let filter = platform_id
            .map(|id| format!(" where platforms = ({});", id))
            .unwrap_or_default();
        let body = format!(
            "search \"{}\"; fields {};{} limit 25;",
            term.replace('"', ""),
            GAME_FIELDS,
            filter
        );
        let games: Vec<IgdbGame> = self.query("games", body).await?;
        Ok(games
            .into_iter()
            .map(|game| game.into_match().schema)
            .collect())
    }

    pub async fn rom_by_id(&self, id: i64) -> ServerResult<Option<SearchRomSchema>> {
        let body = format!("fields {}; where id = {};", GAME_FIELDS, id);
        let mut games: Vec<IgdbGame> = self.query("games", body).await?;
        Ok(games.drain(..).next().map(|game| game.into_match().schema))
    }

    /// First search hit, used by the scanner's automatic matching.
    pub async fn best_match(
        &self,
        term: &str,
        platform_id: Option<i64>,
    ) -> ServerResult<Option<IgdbMatch>> {
        let body = format!(
            "search \"{}\"; fields {};{} limit 1;",
            term.replace('"', ""),
            GAME_FIELDS,
            platform_id
                .map(|id| format!(" where platforms = ({});", id))
                .unwrap_or_default()
        );
        let mut games: Vec<IgdbGame> = self.query("games", body).await?;
        Ok(games.drain(..).next().map(IgdbGame::into_match))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_urls_are_upgraded() {
        assert_eq!(
            full_image_url("//images.igdb.com/igdb/image/upload/t_thumb/co1uii.jpg", "t_cover_big"),
            "https://images.igdb.com/igdb/image/upload/t_cover_big/co1uii.jpg"
        );
        assert_eq!(
            full_image_url("https://example.com/t_thumb/a.jpg", "t_screenshot_huge"),
            "https://example.com/t_screenshot_huge/a.jpg"
        );
    }

    #[test]
    fn games_map_to_search_schema() {
        let raw = r#"[{
            "id": 1068,
            "name": "Super Mario 64",
            "slug": "super-mario-64",
            "summary": "A 3D platformer.",
            "cover": {"url": "//images.igdb.com/t_thumb/co721v.jpg"},
            "screenshots": [{"url": "//images.igdb.com/t_thumb/sc1.jpg"}],
            "genres": [{"name": "Platform"}],
            "involved_companies": [{"company": {"name": "Nintendo"}}],
            "first_release_date": 835574400
        }]"#;
        let games: Vec<IgdbGame> = serde_json::from_str(raw).unwrap();
        let matched = games.into_iter().next().unwrap().into_match();
        assert_eq!(matched.schema.igdb_id, Some(1068));
        assert_eq!(matched.schema.slug, "super-mario-64");
        assert!(matched.schema.igdb_url_cover.contains("t_cover_big"));
        assert_eq!(matched.schema.url_screenshots.len(), 1);
        assert!(matched.schema.moby_url_cover.is_empty());
        assert_eq!(matched.metadata["genres"], serde_json::json!(["Platform"]));
        assert_eq!(matched.metadata["companies"], serde_json::json!(["Nintendo"]));
        assert_eq!(matched.metadata["first_release_date"], 835574400);
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = r#"[{"id": 7, "name": "Obscure Game"}]"#;
        let games: Vec<IgdbGame> = serde_json::from_str(raw).unwrap();
        let matched = games.into_iter().next().unwrap().into_match();
        assert_eq!(matched.schema.slug, "obscure-game");
        assert!(matched.schema.summary.is_empty());
        assert!(matched.schema.igdb_url_cover.is_empty());
        assert_eq!(matched.metadata["genres"], serde_json::json!([]));
    }
}
