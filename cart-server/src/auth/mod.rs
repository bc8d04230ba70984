pub mod claims;
pub mod passwords;
pub mod tokens;
