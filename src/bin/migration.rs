//! Database migration runner
//!
//! Run with: cargo run --bin migration -- up
//!
//! The database comes from the regular configuration (`APP__DATABASE_URL`,
//! `config/*.toml`) unless `--database-url` is given.

use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use hotel_api::{config, db, migrator::Migrator};

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the hotel-api schema", version)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", help = "Overrides the configured database URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: MigrationCommand,
}

#[derive(Subcommand)]
enum MigrationCommand {
    /// Apply pending migrations
    Up {
        #[arg(long, help = "Apply at most this many migrations")]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1, help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// Drop every table and re-apply all migrations
    Fresh,
    /// List migrations and whether they are applied
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let database_url = cli
        .database_url
        .unwrap_or_else(|| cfg.database_url().to_string());
    info!("Connecting to database: {}", database_url);
    let pool = db::establish_connection(&database_url).await?;

    match cli.command {
        MigrationCommand::Up { steps } => {
            Migrator::up(&pool, steps).await?;
            info!("Migrations applied");
        }
        MigrationCommand::Down { steps } => {
            Migrator::down(&pool, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        MigrationCommand::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("Schema recreated from scratch");
        }
        MigrationCommand::Status => {
            Migrator::status(&pool).await?;
        }
    }

    Ok(())
}
