//! capsync CLI: relay server and headless client runner.

use std::path::PathBuf;

use capsync_client::engine::{Engine, EngineEvent};
use capsync_client::{link, load_config};
use capsync_relay::{RelayConfig, RelayServer};
use capsync_types::SenderId;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "capsync",
    about = "Team coordination sync: shared countdowns, boards and roles",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server.
    Relay {
        /// Port to listen on.
        #[arg(short, long, env = "PORT", default_value_t = 8765)]
        port: u16,

        /// Address to bind.
        #[arg(short, long, env = "HOST", default_value = "0.0.0.0")]
        bind: String,

        /// Shared secret clients must present; open relay when unset.
        #[arg(long, env = "PASSWORD")]
        password: Option<String>,
    },

    /// Run a client session.
    Client {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Relay URL, overriding the configuration file.
        #[arg(short, long)]
        server: Option<String>,

        /// Run without any network path, local state only.
        #[arg(long)]
        no_network: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Relay { port, bind, password } => {
            let config = RelayConfig {
                bind,
                port,
                password,
                ..RelayConfig::default()
            };
            let server = RelayServer::bind(config).await?;
            server.run().await?;
        }
        Commands::Client { config, server, no_network } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(url) = server {
                config.relay.url = Some(url);
            }
            if no_network {
                config.relay.url = None;
                config.lan.enabled = false;
            }

            let mut engine = Engine::new(SenderId::new(), config.timers.cycle.clone());
            info!(name = %config.identity.name, id = %engine.local_id(), "starting client");

            let attached = link::establish(&mut engine, &config).await?;
            info!(link = ?attached, "client session up");

            let shutdown = engine.event_sender();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown.send(EngineEvent::Shutdown).await;
                }
            });

            engine.run().await?;
        }
    }

    Ok(())
}
