use anyhow::{Context, Result, bail};
use cart_shared::auth::TokenResponse;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;

/// Authenticated REST client for one server. A 401 triggers one silent
/// token refresh and retry before the error reaches the user.
pub struct RestClient {
    http: reqwest::Client,
    config: Config,
}

impl RestClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            config: Config::load()?,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn url(&self, path: &str) -> Result<String> {
        Ok(format!(
            "{}/api{}",
            self.config.server_url()?.trim_end_matches('/'),
            path
        ))
    }

    pub async fn get<T: DeserializeOwned>(&mut self, path: &str) -> Result<T> {
        self.get_query(path, &[]).await
    }

    /// GET with query parameters; reqwest percent-encodes the values, so
    /// user-supplied terms with spaces or `&` stay intact.
    pub async fn get_query<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.request(Method::GET, path, query, None).await?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn post<T: DeserializeOwned>(
        &mut self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.request(Method::POST, path, &[], Some(body)).await?;
        response.json().await.context("Failed to parse response")
    }

    async fn request(
        &mut self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let response = self
            .send_once(method.clone(), path, query, body.clone())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return error_for_response(response).await;
        }

        debug!("Access token rejected; refreshing");
        self.refresh_tokens().await?;
        let response = self.send_once(method, path, query, body).await?;
        error_for_response(response).await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let token = self
            .config
            .access_token
            .as_deref()
            .context("Not logged in; run `cart login` first")?;
        let mut request = self.http.request(method, self.url(path)?).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.send().await.context("Request failed")
    }

    async fn refresh_tokens(&mut self) -> Result<()> {
        let refresh_token = self
            .config
            .refresh_token
            .clone()
            .context("Session expired; run `cart login` again")?;

        let response = self
            .http
            .post(self.url("/token")?)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
            ])
            .send()
            .await
            .context("Token refresh failed")?;
        if !response.status().is_success() {
            bail!("Session expired; run `cart login` again");
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;
        self.config.access_token = Some(tokens.access_token);
        self.config.refresh_token = Some(tokens.refresh_token);
        self.config.save()?;
        Ok(())
    }
}

/// Surfaces the server's `{"message": ...}` error body when present.
async fn error_for_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    bail!("Server error ({}): {}", status.as_u16(), message)
}

#[cfg(test)]
mod tests {
    #[test]
    fn query_values_are_percent_encoded() {
        let request = reqwest::Client::new()
            .get("http://localhost/api/roms")
            .query(&[("search_term", "mario & luigi"), ("limit", "100")])
            .build()
            .unwrap();
        assert_eq!(
            request.url().query(),
            Some("search_term=mario+%26+luigi&limit=100")
        );
    }
}
