// Market Query CLI - Validate one request envelope and print the typed tree

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use market_query::{
    config::EngineConfig,
    engine::{QueryEngine, Request},
    error::AppError,
    schemas::global_registry,
};

fn read_input() -> anyhow::Result<String> {
    let mut input = String::new();
    match std::env::args().nth(1) {
        Some(path) if path != "-" => {
            input = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read request from {}", path))?;
        }
        _ => {
            std::io::stdin()
                .read_to_string(&mut input)
                .context("failed to read request from stdin")?;
        }
    }
    Ok(input)
}

fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = EngineConfig::from_env()?;
    let registry = global_registry()?;
    let engine = QueryEngine::new(registry, config);
    info!(
        max_depth = config.max_depth,
        entities = registry.len(),
        mirrored_relations = registry.mirrored_relations().len(),
        "Query engine ready"
    );

    let request: Request = serde_json::from_str(&read_input()?).map_err(AppError::from)?;
    match engine.validate_request(&request) {
        Ok(validated) => {
            println!("{}", serde_json::to_string_pretty(&validated)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let err = AppError::from(err);
            warn!(entity = %request.entity, status = err.status_code(), "Rejected request: {}", err);
            println!("{}", serde_json::to_string_pretty(&err.to_response_body())?);
            Ok(ExitCode::FAILURE)
        }
    }
}
