use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;

use calc_orchestrator::engine::config::{parse_url, ServerConfig, WorkerConfig};
use calc_orchestrator::server::{self, auth::TokenKeys};
use calc_orchestrator::worker::Worker;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the orchestrator HTTP server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file (overrides DATABASE_PATH)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Run a pool of workers against an orchestrator
    Worker {
        /// Orchestrator base URL (overrides ORCHESTRATOR_URL)
        #[arg(short, long)]
        url: Option<String>,

        /// Number of concurrent loops (overrides COMPUTING_POWER)
        #[arg(short, long)]
        computing_power: Option<usize>,
    },
    /// Print a bearer token for an owner id
    Token {
        #[arg(short, long)]
        owner: i64,

        #[arg(short, long, default_value = "cli")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Serve { port, database } => {
            let mut config = ServerConfig::from_env();
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(database) = database {
                config.database = database;
            }
            server::serve(config).await?;
        }
        Commands::Worker {
            url,
            computing_power,
        } => {
            let mut config = WorkerConfig::from_env()?;
            if let Some(url) = url {
                config.orchestrator_url = parse_url(&url)?;
            }
            if let Some(n) = computing_power {
                config.computing_power = n.max(1);
            }

            let worker = Worker::from_config(&config)?;
            worker
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Failed to listen for shutdown signal: {}", e);
                    }
                })
                .await?;
        }
        Commands::Token { owner, name } => {
            let config = ServerConfig::from_env();
            let keys = TokenKeys::new(&config.jwt_secret, config.token_ttl_secs)?;
            println!("{}", keys.issue(owner, &name)?);
        }
    }

    Ok(())
}
