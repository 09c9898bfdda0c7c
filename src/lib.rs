//! Event-sourced read layer for alliance pooled-ownership contracts.
//!
//! The indexer subscribes to factory, alliance, and faucet logs, folds
//! them into queryable aggregates in SQLite, and serves them over a small
//! JSON query API. A dual-source gateway answers the same queries from
//! the index when it is reachable and straight from the ledger when it
//! is not, and the write half validates deposits client-side before
//! submitting gas-guarded transactions.

use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use tracing::{error, info};

use crate::config::Config;

pub mod api;
pub mod bindings;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod ingest;
pub mod nft;
pub mod store;
pub mod tx;
pub mod validator;
pub mod wire;

#[cfg(test)]
pub(crate) mod test_utils;

/// Wires everything together and runs until the indexer or the API server
/// exits. Either one stopping is fatal; the process restarts clean rather
/// than limping with half its tasks gone.
pub async fn launch(config: Config) -> anyhow::Result<()> {
    let pool = config::configure_sqlite_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    let ws = WsConnect::new(config.evm.ws_rpc_url.as_str());
    let provider = ProviderBuilder::new().connect_ws(ws).await?;

    health::ensure_contract_deployed(&provider, config.evm.factory, "AllianceFactory").await?;
    health::ensure_contract_deployed(&provider, config.evm.token, "FATK token").await?;
    if let Some(faucet) = config.evm.faucet {
        health::ensure_contract_deployed(&provider, faucet, "FATKFaucet").await?;
    }

    // Gateway reads go over plain HTTP; the WS connection is reserved for
    // the indexer's log subscriptions.
    let http_provider = ProviderBuilder::new()
        .connect_http(config.evm.http_rpc_url.clone())
        .erased();
    let gateway = gateway::Gateway::from_config(&config, http_provider);

    let server = rocket::build()
        .configure(rocket::Config {
            port: config.server_port(),
            ..rocket::Config::default()
        })
        .mount("/", api::api_routes())
        .mount("/", api::gateway_routes())
        .manage(pool.clone())
        .manage(gateway);

    let evm_config = config.evm.clone();
    let indexer = tokio::spawn(async move { ingest::run(pool, provider, evm_config).await });
    let server = tokio::spawn(server.launch());

    tokio::select! {
        result = indexer => {
            error!("Indexer task exited");
            result??;
        }
        result = server => {
            info!("API server exited");
            result??;
        }
    }

    Ok(())
}
