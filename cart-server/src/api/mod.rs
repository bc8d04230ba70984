pub mod assets;
pub mod auth;
pub mod config;
pub mod firmware;
pub mod heartbeat;
pub mod platforms;
pub mod raw;
pub mod roms;
pub mod search;
pub mod serve;
pub mod stats;
pub mod tasks;
pub mod users;
pub mod ws;
