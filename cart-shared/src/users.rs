use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::roles::Role;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserSchema {
    pub id: String,
    pub username: String,
    pub enabled: bool,
    pub role: Role,
    pub oauth_scopes: Vec<String>,
    #[serde(default)]
    pub avatar_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Display for UserSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", json)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserBody {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateUserBody {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub enabled: Option<bool>,
}
