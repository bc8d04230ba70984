use serde::{Deserialize, Serialize};

/// Scopes every authenticated user gets, including viewers. Users always
/// manage their own saves, states and screenshots.
pub const DEFAULT_SCOPES: &[&str] = &[
    "me.read",
    "me.write",
    "roms.read",
    "platforms.read",
    "firmware.read",
    "assets.read",
    "assets.write",
];

/// Added for editors on top of [`DEFAULT_SCOPES`].
pub const WRITE_SCOPES: &[&str] = &["roms.write", "platforms.write", "firmware.write"];

/// Added for admins on top of editor scopes.
pub const FULL_SCOPES: &[&str] = &["users.read", "users.write", "tasks.run"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Default for Role {
    fn default() -> Self {
        Role::Viewer
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::Editor => 1,
            Role::Admin => 2,
        }
    }

    pub fn allows(have: &Role, need: &Role) -> bool {
        have.rank() >= need.rank()
    }

    /// The full scope list granted to this role. Higher roles are strict
    /// supersets of lower ones.
    pub fn scopes(&self) -> Vec<&'static str> {
        let mut scopes = DEFAULT_SCOPES.to_vec();
        if self.rank() >= Role::Editor.rank() {
            scopes.extend_from_slice(WRITE_SCOPES);
        }
        if self.rank() >= Role::Admin.rank() {
            scopes.extend_from_slice(FULL_SCOPES);
        }
        scopes
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            _ => Err(format!(
                "Invalid role: {}. Choose from admin, editor, viewer",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_scopes_are_cumulative() {
        let viewer = Role::Viewer.scopes();
        let editor = Role::Editor.scopes();
        let admin = Role::Admin.scopes();

        assert!(viewer.iter().all(|s| editor.contains(s)));
        assert!(editor.iter().all(|s| admin.contains(s)));
        assert!(editor.contains(&"roms.write"));
        assert!(!viewer.contains(&"roms.write"));
        assert!(admin.contains(&"users.write"));
        assert!(!editor.contains(&"users.write"));
    }

    #[test]
    fn role_ordering() {
        assert!(Role::allows(&Role::Admin, &Role::Viewer));
        assert!(Role::allows(&Role::Editor, &Role::Editor));
        assert!(!Role::allows(&Role::Viewer, &Role::Editor));
    }
}
