#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info};

mod cli;
mod config;
mod db;
mod engine;
mod utils;
mod web;

use config::Config;
use engine::{EngineEvent, MatchEngine};
use web::WebServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = Arc::new(Config::load_from_file(&args.config)?);
    utils::logging::init_tracing(&config.logging);
    info!("heartline matching engine starting up");

    let db_manager = db::DatabaseManager::new(&config.database).await?;
    db_manager.migrate().await?;

    let engine = Arc::new(MatchEngine::new(&db_manager, &config));

    let repaired = engine.reconcile().await?;
    if repaired > 0 {
        info!(repaired, "repaired partially provisioned pairs at startup");
    }

    let web_server = WebServer::new(config.clone(), engine.clone()).await?;

    let mut events = engine.subscribe_events();
    let event_handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::MatchFound { key, users }) => {
                    info!(key = %key, ?users, "match found");
                }
                Ok(EngineEvent::Unmatched { key }) => {
                    info!(key = %key, "pair unmatched");
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("web server error: {}", e);
        }
    });

    tokio::select! {
        _ = web_handle => {},
        _ = event_handle => {},
    }

    info!("heartline shutting down");
    Ok(())
}
