use anyhow::Result;
use arr_api::cli::{self, Cli, Command};
use arr_api::config::ApiConfig;
use arr_api::observability::Observability;
use arr_api::routes;
use arr_api::state::AppState;
use arr_engine::{ArrBreakdownEngine, EngineConfig};
use clap::Parser;
use dotenv::dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    let cli = Cli::parse();
    let obs = Observability::init()?;
    let engine = ArrBreakdownEngine::new(EngineConfig::from_env()?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(obs, engine).await,
        Command::Report {
            snapshot,
            start,
            end,
        } => {
            let report =
                cli::run_report(&engine, &snapshot, start.as_deref(), end.as_deref()).await?;
            println!("{}", report);
            Ok(())
        }
    }
}

async fn serve(obs: Observability, engine: ArrBreakdownEngine) -> Result<()> {
    let config = ApiConfig::from_env()?;
    let state = AppState::new(&config, engine, obs.registry);
    let app = routes::app(state);

    tracing::info!("ARR API listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("ARR API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
}
