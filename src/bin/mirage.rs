use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mirage::{AnthropicClient, Config, Server};

// $ curl localhost:8000/anything
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,reqwest=warn,hyper=warn,hyper_util=warn")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("failed to load configuration")?;
    let completer =
        AnthropicClient::new(&config).context("failed to create completion client")?;

    let mut server = Server::bind(&config)
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    server
        .install_signal_handlers()
        .context("failed to install signal handlers")?;

    match server.run(&completer) {
        Ok(()) => info!("Server shutting down..."),
        Err(e) => error!("Server error: {e}"),
    }

    // Closes the listening socket.
    drop(server);
    info!("Server stopped");

    Ok(())
}
