use clap::{Parser, Subcommand};
use lib::credentials::{CredentialStore, FileCredentialStore};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Order-status webhook to chat survey relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config and the credentials directory.
    Init {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the service: status page, webhook endpoint and the chat session. This is also what
    /// runs when no subcommand is given.
    Gateway {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default: PORT env, then config, then 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Delete stored session credentials so the next start publishes a new pairing code.
    /// Stop the running service first.
    Logout {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Logout { config }) => {
            if let Err(e) = run_logout(config).await {
                log::error!("logout failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = run_gateway(None, None).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting relay on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config, path).await
}

async fn run_logout(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let dir = lib::config::resolve_credentials_dir(&config, &path);
    let store = FileCredentialStore::open(&dir, &config.transport.session_id)?;
    store.clear().await?;
    println!(
        "cleared credentials for session {:?}; the next start will publish a pairing code",
        config.transport.session_id
    );
    Ok(())
}
