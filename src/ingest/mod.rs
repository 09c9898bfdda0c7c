//! Event ingestion: decoding ledger logs into domain events and applying
//! them, one at a time, to the aggregate store.
//!
//! The ingest loop is the store's single writer. Per source address, events
//! arrive in non-decreasing (block, log index) order; replays of an already
//! recorded (tx hash, log index) pair are skipped wholesale so counters can
//! never double-count.

use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bindings::{Alliance, AllianceFactory, FATKFaucet};
use crate::config::EvmConfig;
use crate::error::IngestError;
use crate::ingest::registry::SubscriptionRegistry;
use crate::store::{self, AllianceState, EventKind, EventRecord};

pub mod backfill;
pub mod registry;

/// Decoded payload of one ledger log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    AllianceCreated {
        token: Address,
        admin: Address,
    },
    Deposit {
        user: Address,
        amount: U256,
    },
    FundingCancelled,
    Refunded {
        user: Address,
        amount: U256,
    },
    NftBought {
        nft_address: Address,
        token_id: U256,
        price: U256,
        seller: Address,
    },
    Voted {
        voter: Address,
        weight: U256,
        buyer: Address,
        price: U256,
        sale_deadline: U256,
    },
    SaleExecuted {
        buyer: Address,
        price: U256,
    },
    EmergencyVoted {
        voter: Address,
        weight: U256,
        recipient: Address,
    },
    EmergencyWithdrawn {
        recipient: Address,
        nft_address: Address,
        token_id: U256,
    },
    FaucetClaimed {
        user: Address,
        amount: U256,
        timestamp: U256,
    },
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AllianceCreated { .. } => EventKind::AllianceCreated,
            Self::Deposit { .. } => EventKind::Deposit,
            Self::FundingCancelled => EventKind::FundingCancelled,
            Self::Refunded { .. } => EventKind::Refund,
            Self::NftBought { .. } => EventKind::NftBuy,
            Self::Voted { .. } => EventKind::SaleVote,
            Self::SaleExecuted { .. } => EventKind::SaleExecution,
            Self::EmergencyVoted { .. } => EventKind::EmergencyVote,
            Self::EmergencyWithdrawn { .. } => EventKind::EmergencyWithdraw,
            Self::FaucetClaimed { .. } => EventKind::FaucetClaim,
        }
    }
}

/// One ledger event plus the log coordinates that identify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Emitting contract (the alliance instance, the factory, or the faucet).
    pub address: Address,
    pub block_number: u64,
    pub block_timestamp: Option<u64>,
    pub tx_hash: B256,
    pub log_index: u64,
    pub body: EventBody,
}

fn log_coordinates(log: &Log) -> Result<(B256, u64, u64), IngestError> {
    let tx_hash = log
        .transaction_hash
        .ok_or(IngestError::MissingLogField("transaction_hash"))?;
    let log_index = log
        .log_index
        .ok_or(IngestError::MissingLogField("log_index"))?;
    let block_number = log
        .block_number
        .ok_or(IngestError::MissingLogField("block_number"))?;
    Ok((tx_hash, log_index, block_number))
}

fn raw_event(log: &Log, body: EventBody) -> Result<RawEvent, IngestError> {
    let (tx_hash, log_index, block_number) = log_coordinates(log)?;
    Ok(RawEvent {
        address: log.address(),
        block_number,
        block_timestamp: log.block_timestamp,
        tx_hash,
        log_index,
        body,
    })
}

fn decode_failure(kind: &'static str, log: &Log, source: alloy::sol_types::Error) -> IngestError {
    IngestError::UndecodableLog {
        kind,
        tx_hash: log.transaction_hash.unwrap_or_default(),
        source,
    }
}

/// Decodes a factory log. Returns `None` for topics this indexer does not
/// consume.
pub fn decode_factory_log(log: &Log) -> Result<Option<RawEvent>, IngestError> {
    let Some(&topic0) = log.topic0() else {
        return Ok(None);
    };

    if topic0 != AllianceFactory::AllianceCreated::SIGNATURE_HASH {
        return Ok(None);
    }

    let event = AllianceFactory::AllianceCreated::decode_log_data(log.data())
        .map_err(|e| decode_failure("AllianceCreated", log, e))?;

    let (tx_hash, log_index, block_number) = log_coordinates(log)?;
    Ok(Some(RawEvent {
        // Creation events are keyed by the new instance, not the factory.
        address: event.allianceAddress,
        block_number,
        block_timestamp: log.block_timestamp,
        tx_hash,
        log_index,
        body: EventBody::AllianceCreated {
            token: event.token,
            admin: event.admin,
        },
    }))
}

/// Decodes an alliance instance log.
pub fn decode_alliance_log(log: &Log) -> Result<Option<RawEvent>, IngestError> {
    let Some(&topic0) = log.topic0() else {
        return Ok(None);
    };

    let body = if topic0 == Alliance::Deposit::SIGNATURE_HASH {
        let event = Alliance::Deposit::decode_log_data(log.data())
            .map_err(|e| decode_failure("Deposit", log, e))?;
        EventBody::Deposit {
            user: event.user,
            amount: event.amount,
        }
    } else if topic0 == Alliance::FundingCancelled::SIGNATURE_HASH {
        Alliance::FundingCancelled::decode_log_data(log.data())
            .map_err(|e| decode_failure("FundingCancelled", log, e))?;
        EventBody::FundingCancelled
    } else if topic0 == Alliance::Refunded::SIGNATURE_HASH {
        let event = Alliance::Refunded::decode_log_data(log.data())
            .map_err(|e| decode_failure("Refunded", log, e))?;
        EventBody::Refunded {
            user: event.user,
            amount: event.amount,
        }
    } else if topic0 == Alliance::NFTBought::SIGNATURE_HASH {
        let event = Alliance::NFTBought::decode_log_data(log.data())
            .map_err(|e| decode_failure("NFTBought", log, e))?;
        EventBody::NftBought {
            nft_address: event.nftAddress,
            token_id: event.tokenId,
            price: event.price,
            seller: event.seller,
        }
    } else if topic0 == Alliance::Voted::SIGNATURE_HASH {
        let event = Alliance::Voted::decode_log_data(log.data())
            .map_err(|e| decode_failure("Voted", log, e))?;
        EventBody::Voted {
            voter: event.voter,
            weight: event.weight,
            buyer: event.buyer,
            price: event.price,
            sale_deadline: event.saleDeadline,
        }
    } else if topic0 == Alliance::SaleExecuted::SIGNATURE_HASH {
        let event = Alliance::SaleExecuted::decode_log_data(log.data())
            .map_err(|e| decode_failure("SaleExecuted", log, e))?;
        EventBody::SaleExecuted {
            buyer: event.buyer,
            price: event.price,
        }
    } else if topic0 == Alliance::EmergencyVoted::SIGNATURE_HASH {
        let event = Alliance::EmergencyVoted::decode_log_data(log.data())
            .map_err(|e| decode_failure("EmergencyVoted", log, e))?;
        EventBody::EmergencyVoted {
            voter: event.voter,
            weight: event.weight,
            recipient: event.recipient,
        }
    } else if topic0 == Alliance::EmergencyWithdrawn::SIGNATURE_HASH {
        let event = Alliance::EmergencyWithdrawn::decode_log_data(log.data())
            .map_err(|e| decode_failure("EmergencyWithdrawn", log, e))?;
        EventBody::EmergencyWithdrawn {
            recipient: event.recipient,
            nft_address: event.nftAddress,
            token_id: event.tokenId,
        }
    } else {
        return Ok(None);
    };

    Ok(Some(raw_event(log, body)?))
}

/// Decodes a faucet log.
pub fn decode_faucet_log(log: &Log) -> Result<Option<RawEvent>, IngestError> {
    let Some(&topic0) = log.topic0() else {
        return Ok(None);
    };

    if topic0 != FATKFaucet::Claimed::SIGNATURE_HASH {
        return Ok(None);
    }

    let event = FATKFaucet::Claimed::decode_log_data(log.data())
        .map_err(|e| decode_failure("Claimed", log, e))?;

    Ok(Some(raw_event(
        log,
        EventBody::FaucetClaimed {
            user: event.user,
            amount: event.amount,
            timestamp: event.timestamp,
        },
    )?))
}

/// Applies one event to the aggregate store. Returns `true` when the event
/// was new; `false` means its (tx hash, log index) was already recorded and
/// nothing changed.
///
/// The event record insert and all aggregate deltas share one transaction,
/// so a crash can never persist one without the other.
pub async fn apply_event(pool: &SqlitePool, event: &RawEvent) -> Result<bool, IngestError> {
    let mut tx = pool.begin().await?;

    let record = EventRecord {
        tx_hash: event.tx_hash,
        log_index: event.log_index,
        alliance: event.address,
        kind: event.body.kind(),
        block_number: event.block_number,
        block_timestamp: event.block_timestamp,
        payload: serde_json::to_value(&event.body).map_err(crate::error::StoreError::Payload)?,
    };

    if !store::insert_event_record(&mut *tx, &record).await? {
        debug!(
            tx_hash = %event.tx_hash,
            log_index = event.log_index,
            "Skipping replayed event"
        );
        tx.rollback().await?;
        return Ok(false);
    }

    match &event.body {
        EventBody::AllianceCreated { token, admin } => {
            let mut protocol = store::get_or_create_protocol(&mut *tx).await?;
            let mut alliance = store::get_or_create_alliance(&mut *tx, event.address).await?;

            alliance.token = *token;
            alliance.admin = *admin;
            alliance.created_at = event.block_timestamp.unwrap_or(0);
            alliance.created_at_block = event.block_number;
            alliance.created_tx_hash = event.tx_hash;
            store::save_alliance(&mut *tx, &alliance).await?;

            protocol.alliances_created += U256::from(1);
            store::save_protocol(&mut *tx, &protocol).await?;
        }
        EventBody::Deposit { user, amount } => {
            let mut protocol = store::get_or_create_protocol(&mut *tx).await?;
            let mut alliance = store::get_or_create_alliance(&mut *tx, event.address).await?;
            let mut stats =
                store::get_or_create_participant(&mut *tx, event.address, *user).await?;

            alliance.deposits_count += U256::from(1);
            alliance.total_deposited_volume += *amount;
            store::save_alliance(&mut *tx, &alliance).await?;

            stats.deposited += *amount;
            store::save_participant(&mut *tx, &stats).await?;

            protocol.deposits_count += U256::from(1);
            protocol.deposits_volume += *amount;
            store::save_protocol(&mut *tx, &protocol).await?;
        }
        EventBody::FundingCancelled => {
            let mut alliance = store::get_or_create_alliance(&mut *tx, event.address).await?;
            alliance.advance_state(AllianceState::Closed);
            alliance.funding_failed = true;
            store::save_alliance(&mut *tx, &alliance).await?;
        }
        EventBody::Refunded { user, amount } => {
            let mut stats =
                store::get_or_create_participant(&mut *tx, event.address, *user).await?;
            stats.refunds += *amount;
            store::save_participant(&mut *tx, &stats).await?;
        }
        EventBody::NftBought {
            nft_address,
            token_id,
            ..
        } => {
            let mut alliance = store::get_or_create_alliance(&mut *tx, event.address).await?;
            alliance.nft_address = Some(*nft_address);
            alliance.nft_token_id = Some(*token_id);
            alliance.advance_state(AllianceState::Acquired);
            store::save_alliance(&mut *tx, &alliance).await?;
        }
        EventBody::Voted { voter, .. } => {
            let mut stats =
                store::get_or_create_participant(&mut *tx, event.address, *voter).await?;
            stats.votes += U256::from(1);
            store::save_participant(&mut *tx, &stats).await?;
        }
        EventBody::SaleExecuted { price, .. } => {
            let mut protocol = store::get_or_create_protocol(&mut *tx).await?;
            let mut alliance = store::get_or_create_alliance(&mut *tx, event.address).await?;

            alliance.advance_state(AllianceState::Closed);
            alliance.last_sale_price = Some(*price);
            store::save_alliance(&mut *tx, &alliance).await?;

            protocol.sales_executed += U256::from(1);
            store::save_protocol(&mut *tx, &protocol).await?;
        }
        EventBody::EmergencyVoted { voter, .. } => {
            let mut stats =
                store::get_or_create_participant(&mut *tx, event.address, *voter).await?;
            stats.emergency_votes += U256::from(1);
            store::save_participant(&mut *tx, &stats).await?;
        }
        EventBody::EmergencyWithdrawn {
            nft_address,
            token_id,
            ..
        } => {
            let mut alliance = store::get_or_create_alliance(&mut *tx, event.address).await?;
            alliance.advance_state(AllianceState::Closed);
            alliance.nft_address = Some(*nft_address);
            alliance.nft_token_id = Some(*token_id);
            store::save_alliance(&mut *tx, &alliance).await?;
        }
        EventBody::FaucetClaimed { amount, .. } => {
            let mut protocol = store::get_or_create_protocol(&mut *tx).await?;
            protocol.faucet_claims += U256::from(1);
            protocol.faucet_claimed_volume += *amount;
            store::save_protocol(&mut *tx, &protocol).await?;
        }
    }

    tx.commit().await?;
    Ok(true)
}

/// Snapshots a freshly created alliance's funding parameters from direct
/// contract reads, the way the original factory handler did. Each read
/// tolerates failure independently; a half-deployed instance still gets a
/// row and later events fill in the rest.
pub async fn snapshot_alliance<P: Provider + Clone>(
    pool: &SqlitePool,
    provider: &P,
    address: Address,
) -> Result<(), IngestError> {
    let contract = Alliance::new(address, provider.clone());

    let mut conn = pool.acquire().await.map_err(crate::error::StoreError::Database)?;
    let mut alliance = store::get_or_create_alliance(&mut *conn, address).await?;

    match contract.targetPrice().call().await {
        Ok(target_price) => alliance.target_price = target_price,
        Err(e) => debug!(alliance = %address, "targetPrice read failed during snapshot: {e}"),
    }
    match contract.deadline().call().await {
        Ok(deadline) => alliance.deadline = deadline,
        Err(e) => debug!(alliance = %address, "deadline read failed during snapshot: {e}"),
    }
    match contract.getParticipants().call().await {
        Ok(participants) => {
            alliance.participants_count = u32::try_from(participants.len()).unwrap_or(u32::MAX);
        }
        Err(e) => debug!(alliance = %address, "getParticipants read failed during snapshot: {e}"),
    }
    match contract.state().call().await {
        Ok(state) => match AllianceState::from_u8(state) {
            Some(state) => alliance.advance_state(state),
            None => warn!(alliance = %address, state, "Unknown ledger state during snapshot"),
        },
        Err(e) => debug!(alliance = %address, "state read failed during snapshot: {e}"),
    }
    match contract.nftAddress().call().await {
        Ok(nft_address) if nft_address != Address::ZERO => {
            alliance.nft_address = Some(nft_address);
        }
        Ok(_) => {}
        Err(e) => debug!(alliance = %address, "nftAddress read failed during snapshot: {e}"),
    }
    match contract.tokenId().call().await {
        Ok(token_id) if token_id > U256::ZERO => alliance.nft_token_id = Some(token_id),
        Ok(_) => {}
        Err(e) => debug!(alliance = %address, "tokenId read failed during snapshot: {e}"),
    }

    store::save_alliance(&mut *conn, &alliance).await?;
    Ok(())
}

/// Spawns the live log subscription for one contract address, forwarding
/// decoded events into the single ingest channel.
pub(crate) fn spawn_log_subscription<P>(
    provider: P,
    address: Address,
    decode: fn(&Log) -> Result<Option<RawEvent>, IngestError>,
    sender: mpsc::Sender<RawEvent>,
) -> JoinHandle<()>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let filter = Filter::new().address(address);
        let subscription = match provider.subscribe_logs(&filter).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(%address, "Log subscription failed: {e}");
                return;
            }
        };

        info!(%address, "Subscribed to contract events");

        let mut stream = subscription.into_stream();
        while let Some(log) = futures_util::StreamExt::next(&mut stream).await {
            match decode(&log) {
                Ok(Some(event)) => {
                    if sender.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(%address, "Dropping undecodable log: {e}"),
            }
        }

        warn!(%address, "Log subscription stream ended");
    })
}

/// Runs the indexer: catches up from the deployment block, then consumes
/// live subscriptions, applying events in arrival order as the store's
/// single writer.
pub async fn run<P>(
    pool: SqlitePool,
    provider: P,
    config: EvmConfig,
) -> Result<(), IngestError>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    let (sender, mut receiver) = mpsc::channel::<RawEvent>(256);

    let subscription_provider = provider.clone();
    let subscription_sender = sender.clone();
    let mut registry = SubscriptionRegistry::new(move |address| {
        spawn_log_subscription(
            subscription_provider.clone(),
            address,
            decode_alliance_log,
            subscription_sender.clone(),
        )
    });

    backfill::catch_up(&pool, &provider, &config, &mut registry).await?;

    let _factory_task = spawn_log_subscription(
        provider.clone(),
        config.factory,
        decode_factory_log,
        sender.clone(),
    );
    let _faucet_task = config.faucet.map(|faucet| {
        spawn_log_subscription(provider.clone(), faucet, decode_faucet_log, sender.clone())
    });

    info!("Indexer caught up; processing live events");

    while let Some(event) = receiver.recv().await {
        let is_creation = matches!(event.body, EventBody::AllianceCreated { .. });

        match apply_event(&pool, &event).await {
            Ok(true) if is_creation => {
                if let Err(e) = snapshot_alliance(&pool, &provider, event.address).await {
                    warn!(alliance = %event.address, "Creation snapshot failed: {e}");
                }
                registry.register(event.address);
            }
            Ok(_) => {}
            Err(e) => error!(
                tx_hash = %event.tx_hash,
                log_index = event.log_index,
                "Failed to apply event: {e}"
            ),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{deposit_stats, list_alliances, participant, protocol};
    use crate::test_utils::{deposit_event, raw_event_at, setup_test_db};
    use alloy::primitives::{address, b256};

    const ALLIANCE: Address = address!("0x1111111111111111111111111111111111111111");
    const USER: Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

    #[tokio::test]
    async fn deposit_updates_all_three_aggregates() {
        let pool = setup_test_db().await;

        let applied = apply_event(&pool, &deposit_event(ALLIANCE, USER, 400, 1))
            .await
            .unwrap();
        assert!(applied);

        let alliance = store::alliance(&pool, ALLIANCE).await.unwrap().unwrap();
        assert_eq!(alliance.deposits_count, U256::from(1));
        assert_eq!(alliance.total_deposited_volume, U256::from(400));

        let stats = participant(&pool, ALLIANCE, USER).await.unwrap().unwrap();
        assert_eq!(stats.deposited, U256::from(400));

        let totals = protocol(&pool).await.unwrap().unwrap();
        assert_eq!(totals.deposits_count, U256::from(1));
        assert_eq!(totals.deposits_volume, U256::from(400));
    }

    #[tokio::test]
    async fn replayed_deposit_is_ignored() {
        let pool = setup_test_db().await;
        let event = deposit_event(ALLIANCE, USER, 250, 7);

        assert!(apply_event(&pool, &event).await.unwrap());
        assert!(!apply_event(&pool, &event).await.unwrap());

        let alliance = store::alliance(&pool, ALLIANCE).await.unwrap().unwrap();
        assert_eq!(alliance.deposits_count, U256::from(1));
        assert_eq!(alliance.total_deposited_volume, U256::from(250));

        let (count, total) = deposit_stats(&pool, ALLIANCE).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(total, U256::from(250));
    }

    #[tokio::test]
    async fn volume_matches_event_records() {
        let pool = setup_test_db().await;

        for (i, amount) in [100u64, 250, 37].into_iter().enumerate() {
            let event = deposit_event(ALLIANCE, USER, amount, i as u64);
            apply_event(&pool, &event).await.unwrap();
        }

        let alliance = store::alliance(&pool, ALLIANCE).await.unwrap().unwrap();
        let (count, total) = deposit_stats(&pool, ALLIANCE).await.unwrap();

        assert_eq!(U256::from(count), alliance.deposits_count);
        assert_eq!(total, alliance.total_deposited_volume);
        assert_eq!(total, U256::from(387));
    }

    #[tokio::test]
    async fn state_never_moves_backward() {
        let pool = setup_test_db().await;

        let bought = raw_event_at(
            ALLIANCE,
            10,
            0,
            EventBody::NftBought {
                nft_address: address!("0x2222222222222222222222222222222222222222"),
                token_id: U256::from(1),
                price: U256::from(900),
                seller: address!("0x3333333333333333333333333333333333333333"),
            },
        );
        let sold = raw_event_at(
            ALLIANCE,
            11,
            0,
            EventBody::SaleExecuted {
                buyer: address!("0x4444444444444444444444444444444444444444"),
                price: U256::from(1200),
            },
        );
        // Delivered out of order relative to the sale.
        let late_creation = raw_event_at(
            ALLIANCE,
            12,
            0,
            EventBody::AllianceCreated {
                token: address!("0x5555555555555555555555555555555555555555"),
                admin: address!("0x6666666666666666666666666666666666666666"),
            },
        );

        apply_event(&pool, &bought).await.unwrap();
        let state_after_buy = store::alliance(&pool, ALLIANCE).await.unwrap().unwrap().state;
        assert_eq!(state_after_buy, AllianceState::Acquired);

        apply_event(&pool, &sold).await.unwrap();
        apply_event(&pool, &late_creation).await.unwrap();

        let alliance = store::alliance(&pool, ALLIANCE).await.unwrap().unwrap();
        assert_eq!(alliance.state, AllianceState::Closed);
        assert_eq!(alliance.last_sale_price, Some(U256::from(1200)));
    }

    #[tokio::test]
    async fn funding_cancellation_closes_and_flags() {
        let pool = setup_test_db().await;

        let cancelled = raw_event_at(ALLIANCE, 5, 0, EventBody::FundingCancelled);
        apply_event(&pool, &cancelled).await.unwrap();

        let alliance = store::alliance(&pool, ALLIANCE).await.unwrap().unwrap();
        assert_eq!(alliance.state, AllianceState::Closed);
        assert!(alliance.funding_failed);
    }

    #[tokio::test]
    async fn faucet_claim_touches_protocol_only() {
        let pool = setup_test_db().await;
        let faucet = address!("0x7777777777777777777777777777777777777777");

        let claimed = raw_event_at(
            faucet,
            3,
            0,
            EventBody::FaucetClaimed {
                user: USER,
                amount: U256::from(1_000),
                timestamp: U256::from(1_700_000_000u64),
            },
        );
        apply_event(&pool, &claimed).await.unwrap();

        let totals = protocol(&pool).await.unwrap().unwrap();
        assert_eq!(totals.faucet_claims, U256::from(1));
        assert_eq!(totals.faucet_claimed_volume, U256::from(1_000));
        assert!(list_alliances(&pool, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn creation_registers_base_fields() {
        let pool = setup_test_db().await;

        let mut event = raw_event_at(
            ALLIANCE,
            42,
            0,
            EventBody::AllianceCreated {
                token: address!("0x5555555555555555555555555555555555555555"),
                admin: address!("0x6666666666666666666666666666666666666666"),
            },
        );
        event.block_timestamp = Some(1_700_000_123);
        apply_event(&pool, &event).await.unwrap();

        let alliance = store::alliance(&pool, ALLIANCE).await.unwrap().unwrap();
        assert_eq!(alliance.state, AllianceState::Funding);
        assert_eq!(alliance.created_at, 1_700_000_123);
        assert_eq!(alliance.created_at_block, 42);
        assert_eq!(
            alliance.token,
            address!("0x5555555555555555555555555555555555555555")
        );

        let totals = protocol(&pool).await.unwrap().unwrap();
        assert_eq!(totals.alliances_created, U256::from(1));
    }

    #[test]
    fn factory_log_decodes_to_creation_event() {
        use alloy::primitives::{IntoLogData, Log as PrimitiveLog};

        let factory = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
        let event = AllianceFactory::AllianceCreated {
            allianceAddress: ALLIANCE,
            token: address!("0x5555555555555555555555555555555555555555"),
            admin: address!("0x6666666666666666666666666666666666666666"),
        };

        let log = Log {
            inner: PrimitiveLog {
                address: factory,
                data: event.into_log_data(),
            },
            block_hash: None,
            block_number: Some(42),
            block_timestamp: Some(1_700_000_000),
            transaction_hash: Some(b256!(
                "0xabababababababababababababababababababababababababababababababab"
            )),
            transaction_index: Some(0),
            log_index: Some(2),
            removed: false,
        };

        let decoded = decode_factory_log(&log).unwrap().unwrap();
        assert_eq!(decoded.address, ALLIANCE);
        assert_eq!(decoded.block_number, 42);
        assert_eq!(decoded.log_index, 2);
        assert!(matches!(decoded.body, EventBody::AllianceCreated { .. }));
    }

    #[test]
    fn alliance_log_with_foreign_topic_is_skipped() {
        use alloy::primitives::{Log as PrimitiveLog, LogData};

        let log = Log {
            inner: PrimitiveLog {
                address: ALLIANCE,
                data: LogData::new_unchecked(
                    vec![b256!(
                        "0xdeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddead"
                    )],
                    Default::default(),
                ),
            },
            block_hash: None,
            block_number: Some(1),
            block_timestamp: None,
            transaction_hash: Some(B256::ZERO),
            transaction_index: None,
            log_index: Some(0),
            removed: false,
        };

        assert!(decode_alliance_log(&log).unwrap().is_none());
    }
}
