use anyhow::Result;
use cart_shared::scan::ScanType;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::{auth, library, scan, search, status, update};

#[derive(Parser)]
#[command(name = "cart")]
#[command(version, about = "Cartridge CLI - manage your rom library server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to a Cartridge server
    Login {
        /// Server URL, e.g. http://localhost:5000
        server: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Log out and forget the stored tokens
    Logout,

    /// Show server status and subsystem reports
    Status,

    /// List platforms in the library
    Platforms,

    /// List roms, optionally filtered
    Roms {
        /// Platform id to filter by
        #[arg(long)]
        platform: Option<String>,
        /// Search term matched against names
        #[arg(long)]
        search: Option<String>,
    },

    /// Show library statistics
    Stats,

    /// Show the server's library configuration
    Config,

    /// Run a library scan and stream its progress
    Scan {
        /// quick, complete, new_platforms, partial, unidentified or no_scan
        #[arg(long = "type", default_value = "quick", value_parser = parse_scan_type)]
        scan_type: ScanType,
        /// Platform ids to scan; default is every platform on disk
        #[arg(long)]
        platform: Vec<String>,
        /// Metadata sources to query; default is all enabled sources
        #[arg(long)]
        api: Vec<String>,
        /// Stop the running scan instead of starting one
        #[arg(long, conflicts_with_all = ["platform", "api"])]
        stop: bool,
    },

    /// Search a metadata source for matches to a rom
    Search {
        /// Rom id to search matches for
        rom_id: String,
        /// Metadata source: igdb or moby
        #[arg(long, default_value = "igdb")]
        source: String,
        /// Search term; defaults to the rom's tag-stripped file name
        #[arg(long)]
        term: Option<String>,
        /// Search by "name" or "id"
        #[arg(long, default_value = "name")]
        by: String,
    },

    /// Update the CLI to the latest release
    Update,

    /// Show CLI version information
    Version,
}

fn parse_scan_type(s: &str) -> Result<ScanType, String> {
    ScanType::from_str(s)
}

pub async fn cli() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Login {
            server,
            username,
            password,
        } => auth::login(&server, &username, &password).await,
        Commands::Logout => auth::logout(),
        Commands::Status => status::status().await,
        Commands::Platforms => library::platforms().await,
        Commands::Roms { platform, search } => {
            library::roms(platform.as_deref(), search.as_deref()).await
        }
        Commands::Stats => library::stats().await,
        Commands::Config => library::config().await,
        Commands::Scan {
            scan_type,
            platform,
            api,
            stop,
        } => {
            if stop {
                scan::stop().await
            } else {
                scan::scan(scan_type, platform, api).await
            }
        }
        Commands::Search {
            rom_id,
            source,
            term,
            by,
        } => search::search(&rom_id, &source, term.as_deref(), &by).await,
        Commands::Update => update::update(true).await.map(|_| ()),
        Commands::Version => {
            println!("cart {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
