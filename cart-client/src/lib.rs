pub mod auth;
pub mod cli;
pub mod config;
pub mod library;
pub mod rest;
pub mod scan;
pub mod search;
pub mod status;
pub mod update;

/// Entrypoint used by `main.rs` and tests to run the full CLI.
pub async fn run_cli() -> anyhow::Result<()> {
    cli::cli().await
}
