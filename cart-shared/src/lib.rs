pub mod assets;
pub mod auth;
pub mod config;
pub mod firmware;
pub mod heartbeat;
pub mod platform;
pub mod rom;
pub mod roles;
pub mod scan;
pub mod search;
pub mod stats;
pub mod tasks;
pub mod users;
