use anyhow::Result;
use clap::{Parser, Subcommand};
use kurz::config::{Config, DatabaseBackend};
use kurz::storage::{PostgresStore, SqliteStore, Store};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kurz-admin")]
#[command(about = "Kurz admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all links
    List,
    /// Rewrite every link's click counter from its ledger rows.
    /// The ledger is the authoritative count; this repairs any drift left
    /// by buffered increments or a crash between the two writes.
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStore::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStore::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    store.init().await?;

    match cli.command {
        Commands::List => {
            let links = store.list_all().await?;
            if links.is_empty() {
                println!("No links found.");
            } else {
                println!("{:<20} {:<20} {:>8}  {}", "Code", "Owner", "Clicks", "Destination");
                println!("{}", "-".repeat(80));
                for link in links {
                    println!(
                        "{:<20} {:<20} {:>8}  {}",
                        link.short_code, link.owner_id, link.clicks, link.destination_url
                    );
                }
            }
        }
        Commands::Reconcile => {
            let changed = store.reconcile_click_counts().await?;
            if changed == 0 {
                println!("✓ All click counters already match the ledger");
            } else {
                println!("✓ Reconciled {} click counter(s) from the ledger", changed);
            }
        }
    }

    Ok(())
}
