pub mod assets;
pub mod firmware;
pub mod note;
pub mod platform;
pub mod rom;
pub mod user;

use mongodb::bson::DateTime;

/// Wire timestamps are RFC3339 strings; Mongo stores bson dates.
pub(crate) fn rfc3339(dt: &DateTime) -> String {
    dt.try_to_rfc3339_string().unwrap_or_default()
}
