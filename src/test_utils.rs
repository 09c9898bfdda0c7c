//! Shared fixtures for module tests: an in-memory migrated database and
//! synthetic ledger events with unique transaction hashes.

use alloy::primitives::{Address, B256, U256, keccak256};
use sqlx::SqlitePool;

use crate::ingest::{EventBody, RawEvent};

pub(crate) async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("migrations apply cleanly");
    pool
}

/// Deterministic per-coordinate hash so distinct fixture events never
/// collide on the (tx_hash, log_index) primary key.
fn fixture_tx_hash(address: Address, block_number: u64, log_index: u64) -> B256 {
    let mut preimage = Vec::with_capacity(36);
    preimage.extend_from_slice(address.as_slice());
    preimage.extend_from_slice(&block_number.to_be_bytes());
    preimage.extend_from_slice(&log_index.to_be_bytes());
    keccak256(&preimage)
}

pub(crate) fn raw_event_at(
    address: Address,
    block_number: u64,
    log_index: u64,
    body: EventBody,
) -> RawEvent {
    RawEvent {
        address,
        block_number,
        block_timestamp: None,
        tx_hash: fixture_tx_hash(address, block_number, log_index),
        log_index,
        body,
    }
}

pub(crate) fn deposit_event(
    alliance: Address,
    user: Address,
    amount: u64,
    log_index: u64,
) -> RawEvent {
    raw_event_at(
        alliance,
        100 + log_index,
        log_index,
        EventBody::Deposit {
            user,
            amount: U256::from(amount),
        },
    )
}
