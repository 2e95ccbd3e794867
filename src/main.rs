use mysqladm::catalog::Catalog;
use mysqladm::config;
use mysqladm::core::db::MySqlEngine;
use mysqladm::logging;
use mysqladm::server::Server;
use mysqladm::tools::ToolRegistry;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

async fn run(config_arg: Option<String>) -> mysqladm::core::Result<()> {
    let config = config::load(config_arg.as_deref())?;
    logging::init(&config.logging)?;

    info!(
        "Starting {} for {}@{}:{}",
        config.server.name, config.database.user, config.database.host, config.database.port
    );

    let catalog = Catalog::new(Arc::new(MySqlEngine::new()), &config)?;
    let server = Server::new(ToolRegistry::new(Arc::new(catalog)), config.server.name.clone());
    server.serve_stdio().await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Optional path to a TOML configuration file
    let config_arg = std::env::args().nth(1);

    match run(config_arg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("mysqladm: {}", e);
            ExitCode::FAILURE
        }
    }
}
