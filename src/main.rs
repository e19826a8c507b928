mod config;
mod database;
mod entities;
mod error;
mod file_hash;
mod http_server;
mod logging;
mod player;
mod ports;
mod seed;
mod services;
#[cfg(test)]
mod test_utils;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    config::Config,
    database::Database,
    http_server::state::AppState,
    logging::{LogFormat, init_tracing},
    services::media_store::LocalMediaStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "ISPMEDIA_CONFIG")]
    config: Option<PathBuf>,

    /// Tracing filter, e.g. `info` or `ispmedia=debug,tower_http=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Console log format
    #[arg(long, value_enum, default_value_t, global = true, env = "LOG_FORMAT")]
    log_format: LogFormat,

    /// OTLP/gRPC endpoint to export traces to
    #[arg(long, global = true, env = "OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// The port to run the server on
        #[arg(short, long, default_value = "3000", env = "ISPMEDIA_HTTP_PORT")]
        port: u16,
    },
    /// Load the demo catalogue into an empty database
    Seed {
        /// Password of the `admin` account created by the seed
        #[arg(long, env = "ISPMEDIA_SEED_ADMIN_PASSWORD")]
        admin_password: String,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(
        "ispmedia",
        args.otlp_endpoint.as_deref(),
        &args.log_level,
        args.log_format,
    )?;

    let result = run(args).await;

    if let Some(tracer_provider) = tracer_provider {
        if let Err(e) = tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
    }

    result
}

async fn run(args: Args) -> Result<()> {
    if let Commands::Config(config_commands) = &args.command {
        match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                let path = Config::create_default()?;
                log::info!("Default config created at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        }
        return Ok(());
    }

    log::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .with_context(|| "Failed to load ispmedia config")?;

    let database = Arc::new(Database::open(&config.database_path()).await?);

    match args.command {
        Commands::Serve { port } => {
            let media_store = LocalMediaStore::new(config.upload_directory_path())?;
            let app_state = Arc::new(AppState::new(database, config, Arc::new(media_store)));

            log::info!("Starting HTTP server on port: {}", port);
            http_server::app::start(port, app_state).await?;
        }
        Commands::Seed { admin_password } => {
            let report = seed::seed(database, &admin_password)
                .await
                .wrap_err("Failed to seed the database")?;
            if report.is_empty() {
                println!("Database already has a catalogue, nothing to seed");
            } else {
                println!(
                    "Seeded {} artists, {} albums, {} musics and {} playlists",
                    report.artists, report.albums, report.musics, report.playlists
                );
            }
        }
        Commands::Config(_) => {}
    }

    Ok(())
}
