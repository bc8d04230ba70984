use serde::{Deserialize, Serialize};

/// OAuth2-style form posted to `POST /api/token`. `grant_type` selects
/// between `password` (username + password + scope) and `refresh_token`.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct TokenRequestForm {
    pub grant_type: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub msg: String,
}
