use std::sync::Arc;

use clap::Parser;
use tracing::info;

use trellis_crud::{register_commands, CrudApi, HttpCrudClient};
use trellis_gateway::{CommandRouter, SessionRegistry};

mod logging;
mod probe;
mod server;
mod state;

use logging::init_logging;
use probe::{run_startup_probe, PROBE_MAX_ATTEMPTS, PROBE_RETRY_DELAY};
use server::run_server;
use state::{AppState, ServerConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "trellis-server")]
#[command(about = "Trellis SSE command gateway")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG")]
    debug: bool,

    /// Listen host (overrides HTTP_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Base URL of the backing CRUD API (overrides CRUD_API_URL)
    #[arg(long)]
    crud_api_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = ServerConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.crud_api_url {
        config.crud_api_url = url;
    }

    info!("Starting Trellis command gateway");
    info!("  Listen: {}:{}", config.host, config.port);
    info!("  CRUD API: {}", config.crud_api_url);

    let api: Arc<dyn CrudApi> = Arc::new(HttpCrudClient::new(config.crud_api_url.clone()));

    let registry = Arc::new(SessionRegistry::new());
    let router = Arc::new(CommandRouter::new(Arc::clone(&registry)));
    register_commands(&router, Arc::clone(&api))?;
    info!("Registered commands: {}", router.command_names().join(", "));

    // Best-effort warm-up of the backing API; never gates the listener.
    let probe_api = Arc::clone(&api);
    tokio::spawn(async move {
        run_startup_probe(probe_api, PROBE_MAX_ATTEMPTS, PROBE_RETRY_DELAY).await;
    });

    let state = AppState::new(config, registry, router);
    run_server(state).await
}
