use anyhow::{Context, Result, bail};
use cart_shared::auth::TokenResponse;

use crate::config::Config;

/// Password-grant login against `POST /api/token`, storing the tokens in
/// the client config.
pub async fn login(server: &str, username: &str, password: &str) -> Result<()> {
    let server = server.trim_end_matches('/').to_string();

    let response = reqwest::Client::new()
        .post(format!("{}/api/token", server))
        .form(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ])
        .send()
        .await
        .context("Could not reach the server")?;
    if !response.status().is_success() {
        bail!("Login failed ({})", response.status().as_u16());
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    let config = Config {
        server_url: Some(server),
        username: Some(username.to_string()),
        access_token: Some(tokens.access_token),
        refresh_token: Some(tokens.refresh_token),
    };
    config.save()?;

    println!("Logged in as {}", username);
    Ok(())
}

pub fn logout() -> Result<()> {
    Config::clear()?;
    println!("Logged out");
    Ok(())
}
