//! MobyGames client. A plain API-key REST API; search only, MobyGames
//! has no equivalent of IGDB's id lookup worth exposing.

use cart_shared::search::SearchRomSchema;
use serde::Deserialize;

use crate::response::ServerResult;

const MOBY_API_URL: &str = "https://api.mobygames.com/v1";

pub struct MobyClient {
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MobyGamesResponse {
    #[serde(default)]
    games: Vec<MobyGame>,
}

#[derive(Debug, Deserialize)]
struct MobyCover {
    image: String,
}

#[derive(Debug, Deserialize)]
struct MobyGenre {
    genre_name: String,
}

#[derive(Debug, Deserialize)]
struct MobyAlternate {
    title: String,
}

#[derive(Debug, Deserialize)]
struct MobyGame {
    game_id: i64,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    moby_url: String,
    #[serde(default)]
    sample_cover: Option<MobyCover>,
    #[serde(default)]
    sample_screenshots: Vec<MobyCover>,
    #[serde(default)]
    genres: Vec<MobyGenre>,
    #[serde(default)]
    alternate_titles: Vec<MobyAlternate>,
}

/// A matched game plus the blob stored on the rom as `moby_metadata`.
#[derive(Debug)]
pub struct MobyMatch {
    pub schema: SearchRomSchema,
    pub metadata: serde_json::Value,
}

impl MobyGame {
    fn into_match(self) -> MobyMatch {
        let metadata = serde_json::json!({
            "moby_url": self.moby_url,
            "genres": self
                .genres
                .into_iter()
                .map(|g| g.genre_name)
                .collect::<Vec<_>>(),
            "alternate_titles": self
                .alternate_titles
                .into_iter()
                .map(|t| t.title)
                .collect::<Vec<_>>(),
        });

        let slug = self.title.to_lowercase().replace(' ', "-");
        MobyMatch {
            schema: SearchRomSchema {
                igdb_id: None,
                moby_id: Some(self.game_id),
                slug,
                name: self.title,
                // Moby descriptions come as HTML; strip nothing here, the
                // UI sanitizes before display.
                summary: self.description,
                igdb_url_cover: String::new(),
                moby_url_cover: self.sample_cover.map(|c| c.image).unwrap_or_default(),
                url_screenshots: self
                    .sample_screenshots
                    .into_iter()
                    .map(|s| s.image)
                    .collect(),
            },
            metadata,
        }
    }
}

impl MobyClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn search_roms(
        &self,
        term: &str,
        platform_id: Option<i64>,
    ) -> ServerResult<Vec<SearchRomSchema>> {
        let games = self.fetch_games(term, platform_id).await?;
        Ok(games
            .into_iter()
            .map(|game| game.into_match().schema)
            .collect())
    }

    pub async fn best_match(
        &self,
        term: &str,
        platform_id: Option<i64>,
    ) -> ServerResult<Option<MobyMatch>> {
        let mut games = self.fetch_games(term, platform_id).await?;
        if games.is_empty() {
            return Ok(None);
        }
        Ok(Some(games.remove(0).into_match()))
    }

    async fn fetch_games(&self, term: &str, platform_id: Option<i64>) -> ServerResult<Vec<MobyGame>> {
        let mut query: Vec<(String, String)> = vec![
            ("api_key".into(), self.api_key.clone()),
            ("title".into(), term.to_string()),
            ("limit".into(), "25".into()),
        ];
        if let Some(id) = platform_id {
            query.push(("platform".into(), id.to_string()));
        }

        let response: MobyGamesResponse = self
            .http
            .get(format!("{}/games", MOBY_API_URL))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn games_map_to_search_schema() {
        let raw = r#"{
            "games": [{
                "game_id": 1738,
                "title": "Super Mario 64",
                "description": "<p>A 3D platformer.</p>",
                "moby_url": "https://www.mobygames.com/game/1738",
                "sample_cover": {"image": "https://cdn.mobygames.com/covers/sm64.jpg"},
                "sample_screenshots": [{"image": "https://cdn.mobygames.com/shots/1.jpg"}],
                "genres": [{"genre_name": "Action"}],
                "alternate_titles": [{"title": "Supa Mario 64"}]
            }]
        }"#;
        let response: MobyGamesResponse = serde_json::from_str(raw).unwrap();
        let matched = response.games.into_iter().next().unwrap().into_match();
        assert_eq!(matched.schema.moby_id, Some(1738));
        assert_eq!(matched.schema.slug, "super-mario-64");
        assert!(matched.schema.igdb_url_cover.is_empty());
        assert!(matched.schema.moby_url_cover.contains("sm64"));
        assert_eq!(
            matched.metadata["alternate_titles"],
            serde_json::json!(["Supa Mario 64"])
        );
        assert_eq!(matched.metadata["genres"], serde_json::json!(["Action"]));
    }

    #[test]
    fn empty_response_yields_no_games() {
        let response: MobyGamesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.games.is_empty());
    }
}
