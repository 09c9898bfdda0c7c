//! Historical catch-up: replays factory, alliance, and faucet logs from the
//! deployment block before live subscriptions take over.
//!
//! Each range is fetched once; there is no retry policy. A failed fetch
//! aborts the catch-up and surfaces the transport error.

use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::EvmConfig;
use crate::error::IngestError;
use crate::ingest::registry::SubscriptionRegistry;
use crate::ingest::{
    EventBody, RawEvent, apply_event, decode_alliance_log, decode_factory_log, decode_faucet_log,
    snapshot_alliance,
};

const BACKFILL_BATCH_SIZE: u64 = 1_000;

/// Splits an inclusive block range into fixed-size fetch batches.
pub(crate) fn batch_ranges(start_block: u64, end_block: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut batch_start = start_block;

    while batch_start <= end_block {
        let batch_end = batch_start
            .saturating_add(BACKFILL_BATCH_SIZE - 1)
            .min(end_block);
        ranges.push((batch_start, batch_end));
        batch_start = batch_end.saturating_add(1);
    }

    ranges
}

/// Fetches and decodes all consumable logs for one address over a block
/// range, sorted by (block number, log index).
async fn collect_events<P: Provider + Clone>(
    provider: &P,
    address: Address,
    start_block: u64,
    end_block: u64,
    decode: fn(&Log) -> Result<Option<RawEvent>, IngestError>,
) -> Result<Vec<RawEvent>, IngestError> {
    let mut events = Vec::new();

    for (batch_start, batch_end) in batch_ranges(start_block, end_block) {
        let filter = Filter::new()
            .address(address)
            .from_block(batch_start)
            .to_block(batch_end);

        let logs = provider.get_logs(&filter).await?;
        for log in &logs {
            match decode(log) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => warn!(%address, "Skipping undecodable historical log: {e}"),
            }
        }
    }

    events.sort_by_key(|event| (event.block_number, event.log_index));
    Ok(events)
}

/// Replays history from the deployment block to the current head: factory
/// creations first (each one registering its alliance), then every known
/// alliance's own events, then faucet claims.
pub(crate) async fn catch_up<P, S>(
    pool: &SqlitePool,
    provider: &P,
    config: &EvmConfig,
    registry: &mut SubscriptionRegistry<S>,
) -> Result<(), IngestError>
where
    P: Provider + Clone + Send + Sync + 'static,
    S: FnMut(Address) -> tokio::task::JoinHandle<()>,
{
    let end_block = provider.get_block_number().await?;
    let start_block = config.deployment_block;

    if start_block > end_block {
        info!("Deployment block {start_block} is ahead of head {end_block}; nothing to backfill");
        return Ok(());
    }

    info!(
        "Backfilling from block {start_block} to {end_block} ({} blocks)",
        end_block - start_block + 1
    );

    let creations = collect_events(
        provider,
        config.factory,
        start_block,
        end_block,
        decode_factory_log,
    )
    .await?;

    for event in &creations {
        let newly_applied = apply_event(pool, event).await?;
        if newly_applied {
            if let Err(e) = snapshot_alliance(pool, provider, event.address).await {
                warn!(alliance = %event.address, "Creation snapshot failed: {e}");
            }
        }
        debug_assert!(matches!(event.body, EventBody::AllianceCreated { .. }));
    }

    let alliances = crate::store::alliance_addresses(pool).await?;
    for alliance in &alliances {
        let events = collect_events(
            provider,
            *alliance,
            start_block,
            end_block,
            decode_alliance_log,
        )
        .await?;

        for event in &events {
            apply_event(pool, event).await?;
        }

        registry.register(*alliance);
    }

    if let Some(faucet) = config.faucet {
        let claims =
            collect_events(provider, faucet, start_block, end_block, decode_faucet_log).await?;
        for event in &claims {
            apply_event(pool, event).await?;
        }
    }

    info!(
        alliances = alliances.len(),
        "Backfill complete"
    );
    Ok(())
}
