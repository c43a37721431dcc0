//! Herald operator CLI
//!
//! Migrates the database, provisions applications, and inspects or rebuilds
//! the cached channel configuration.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use herald_core::config::{self, Config};
use herald_core::tracing_init::init_tracing;
use herald_server::cache::{ApplicationCache, CacheBackend};
use herald_server::services::{ApplicationService, ChannelConfigService, DeviceService};
use herald_server::storage::{HeraldDatabase, NewApplication};

#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(version, about = "Herald push backend - device sync and channel config")]
struct Args {
    /// Explicit settings file, layered over the global one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Redis URL for the channel-config cache.
    #[arg(long, global = true)]
    redis_url: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the database and apply pending migrations.
    Migrate,

    /// Create an application and print its UUID and auth key.
    CreateApp {
        #[arg(long)]
        account_id: i64,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        sender_id: String,
    },

    /// List applications, all of them unless an account is given.
    Apps {
        #[arg(long)]
        account_id: Option<i64>,
    },

    /// Print the Android channel configuration of an application.
    ChannelConfig {
        app_uuid: String,

        /// Rebuild from the database and overwrite the cached copy.
        #[arg(long)]
        rebuild: bool,
    },

    /// Print one page of an application's devices.
    Devices {
        app_uuid: String,

        #[arg(long, default_value_t = 0)]
        last_id: i64,

        /// Page size; 0 means the configured maximum.
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.db_path {
            config.database.path = Some(path.clone());
        }
        if let Some(url) = &self.redis_url {
            config.cache.redis_url = Some(url.clone());
        }
        if self.log_json {
            config.server.log_json = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = config::load_config(args.config.as_deref())?;
    args.apply_to(&mut config);

    init_tracing(&config.server.log_level, config.server.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting herald");

    let db = open_database(&config).await?;

    match args.command {
        Command::Migrate => {
            info!("Migrations applied");
        }
        Command::CreateApp {
            account_id,
            name,
            sender_id,
        } => {
            let app = ApplicationService::new(db)
                .create(
                    account_id,
                    &NewApplication {
                        name,
                        fcm_sender_id: sender_id,
                        ..NewApplication::default()
                    },
                )
                .await?;
            print_json(&serde_json::json!({
                "uuid": app.uuid,
                "auth_key": app.auth_key,
            }))?;
        }
        Command::Apps { account_id } => {
            let svc = ApplicationService::new(db);
            let apps = match account_id {
                Some(id) => svc.list(id).await?,
                None => svc.list_all().await?,
            };
            print_json(&apps)?;
        }
        Command::ChannelConfig { app_uuid, rebuild } => {
            let cache = CacheBackend::from_config(&config.cache).await?;
            let svc = ChannelConfigService::new(db, ApplicationCache::new(cache));
            let model = if rebuild {
                svc.rebuild_android_params(&app_uuid).await?
            } else {
                svc.get_android_params(&app_uuid).await?
            };
            print_json(&model)?;
        }
        Command::Devices {
            app_uuid,
            last_id,
            limit,
        } => {
            let svc = DeviceService::new(db, config.devices.max_page_size);
            let devices = svc.get_list(&app_uuid, last_id, limit).await?;
            print_json(&devices)?;
        }
    }

    Ok(())
}

async fn open_database(config: &Config) -> anyhow::Result<HeraldDatabase> {
    let path = match &config.database.path {
        Some(path) => path.clone(),
        None => config::database_path().context("Cannot determine data directory")?,
    };
    info!(path = %path.display(), "Opening herald database");
    Ok(HeraldDatabase::open(&path).await?)
}

#[allow(clippy::print_stdout)]
fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
