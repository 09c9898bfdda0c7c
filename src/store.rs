//! SQLite-backed aggregate store: the protocol singleton, per-alliance and
//! per-participant aggregates, and the immutable event-record table.
//!
//! The store is written by the single ingest task only; the query API and
//! tests read it concurrently through the pool. Every uint256 counter is
//! persisted as decimal TEXT because SQLite integers top out at 64 bits.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::warn;

use crate::error::StoreError;

/// Fixed id of the protocol singleton row.
pub const PROTOCOL_ID: &str = "flashalliance";

/// Forward-only alliance lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AllianceState {
    Funding = 0,
    Acquired = 1,
    Closed = 2,
}

impl AllianceState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Funding),
            1 => Some(Self::Acquired),
            2 => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::Funding => "Funding",
            Self::Acquired => "Acquired",
            Self::Closed => "Closed",
        }
    }
}

/// Human-readable hint for a raw ledger state byte, including values this
/// version does not know about.
pub fn state_hint(state: u8) -> &'static str {
    AllianceState::from_u8(state).map_or("Unknown", AllianceState::hint)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub alliances_created: U256,
    pub deposits_count: U256,
    pub deposits_volume: U256,
    pub sales_executed: U256,
    pub faucet_claims: U256,
    pub faucet_claimed_volume: U256,
}

impl Protocol {
    fn zeroed() -> Self {
        Self {
            alliances_created: U256::ZERO,
            deposits_count: U256::ZERO,
            deposits_volume: U256::ZERO,
            sales_executed: U256::ZERO,
            faucet_claims: U256::ZERO,
            faucet_claimed_volume: U256::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllianceRecord {
    pub id: Address,
    pub token: Address,
    pub admin: Address,
    pub created_at: u64,
    pub created_at_block: u64,
    pub created_tx_hash: B256,
    pub target_price: U256,
    pub deadline: U256,
    pub participants_count: u32,
    pub funding_failed: bool,
    pub state: AllianceState,
    pub deposits_count: U256,
    pub total_deposited_volume: U256,
    pub last_sale_price: Option<U256>,
    pub nft_address: Option<Address>,
    pub nft_token_id: Option<U256>,
}

impl AllianceRecord {
    pub(crate) fn zeroed(id: Address) -> Self {
        Self {
            id,
            token: Address::ZERO,
            admin: Address::ZERO,
            created_at: 0,
            created_at_block: 0,
            created_tx_hash: B256::ZERO,
            target_price: U256::ZERO,
            deadline: U256::ZERO,
            participants_count: 0,
            funding_failed: false,
            state: AllianceState::Funding,
            deposits_count: U256::ZERO,
            total_deposited_volume: U256::ZERO,
            last_sale_price: None,
            nft_address: None,
            nft_token_id: None,
        }
    }

    /// Moves the lifecycle forward, never backward. A backward request is
    /// logged and dropped so a replayed or misordered event can't rewind
    /// an alliance.
    pub fn advance_state(&mut self, next: AllianceState) {
        if next < self.state {
            warn!(
                alliance = %self.id,
                current = self.state.hint(),
                requested = next.hint(),
                "Ignoring backward state transition"
            );
            return;
        }
        self.state = next;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantStats {
    pub alliance: Address,
    pub participant: Address,
    pub deposited: U256,
    pub refunds: U256,
    pub votes: U256,
    pub emergency_votes: U256,
}

impl ParticipantStats {
    fn zeroed(alliance: Address, participant: Address) -> Self {
        Self {
            alliance,
            participant,
            deposited: U256::ZERO,
            refunds: U256::ZERO,
            votes: U256::ZERO,
            emergency_votes: U256::ZERO,
        }
    }

    pub fn composite_id(alliance: Address, participant: Address) -> String {
        format!("{alliance:#x}-{participant:#x}")
    }
}

/// Event-record kinds. `AllianceCreated` and `FundingCancelled` carry no
/// per-event payload worth querying; they get rows anyway so every handler
/// shares the same replay guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AllianceCreated,
    Deposit,
    FundingCancelled,
    Refund,
    NftBuy,
    SaleVote,
    SaleExecution,
    EmergencyVote,
    EmergencyWithdraw,
    FaucetClaim,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllianceCreated => "alliance_created",
            Self::Deposit => "deposit",
            Self::FundingCancelled => "funding_cancelled",
            Self::Refund => "refund",
            Self::NftBuy => "nft_buy",
            Self::SaleVote => "sale_vote",
            Self::SaleExecution => "sale_execution",
            Self::EmergencyVote => "emergency_vote",
            Self::EmergencyWithdraw => "emergency_withdraw",
            Self::FaucetClaim => "faucet_claim",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub tx_hash: B256,
    pub log_index: u64,
    pub alliance: Address,
    pub kind: EventKind,
    pub block_number: u64,
    pub block_timestamp: Option<u64>,
    pub payload: serde_json::Value,
}

fn parse_u256(column: &'static str, value: &str) -> Result<U256, StoreError> {
    value.parse::<U256>().map_err(|_| StoreError::InvalidColumn {
        column,
        value: value.to_string(),
    })
}

fn parse_address(column: &'static str, value: &str) -> Result<Address, StoreError> {
    value.parse::<Address>().map_err(|_| StoreError::InvalidColumn {
        column,
        value: value.to_string(),
    })
}

fn parse_opt_u256(column: &'static str, value: Option<String>) -> Result<Option<U256>, StoreError> {
    value.as_deref().map(|v| parse_u256(column, v)).transpose()
}

fn addr_key(address: Address) -> String {
    format!("{address:#x}")
}

pub async fn get_or_create_protocol(conn: &mut SqliteConnection) -> Result<Protocol, StoreError> {
    let row = sqlx::query("SELECT * FROM protocol WHERE id = ?")
        .bind(PROTOCOL_ID)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => decode_protocol(&row),
        None => {
            let protocol = Protocol::zeroed();
            save_protocol(conn, &protocol).await?;
            Ok(protocol)
        }
    }
}

pub async fn save_protocol(
    conn: &mut SqliteConnection,
    protocol: &Protocol,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO protocol (
            id, alliances_created, deposits_count, deposits_volume,
            sales_executed, faucet_claims, faucet_claimed_volume
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            alliances_created = excluded.alliances_created,
            deposits_count = excluded.deposits_count,
            deposits_volume = excluded.deposits_volume,
            sales_executed = excluded.sales_executed,
            faucet_claims = excluded.faucet_claims,
            faucet_claimed_volume = excluded.faucet_claimed_volume
        ",
    )
    .bind(PROTOCOL_ID)
    .bind(protocol.alliances_created.to_string())
    .bind(protocol.deposits_count.to_string())
    .bind(protocol.deposits_volume.to_string())
    .bind(protocol.sales_executed.to_string())
    .bind(protocol.faucet_claims.to_string())
    .bind(protocol.faucet_claimed_volume.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn protocol(pool: &SqlitePool) -> Result<Option<Protocol>, StoreError> {
    let row = sqlx::query("SELECT * FROM protocol WHERE id = ?")
        .bind(PROTOCOL_ID)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(decode_protocol).transpose()
}

fn decode_protocol(row: &sqlx::sqlite::SqliteRow) -> Result<Protocol, StoreError> {
    Ok(Protocol {
        alliances_created: parse_u256("alliances_created", &row.get::<String, _>("alliances_created"))?,
        deposits_count: parse_u256("deposits_count", &row.get::<String, _>("deposits_count"))?,
        deposits_volume: parse_u256("deposits_volume", &row.get::<String, _>("deposits_volume"))?,
        sales_executed: parse_u256("sales_executed", &row.get::<String, _>("sales_executed"))?,
        faucet_claims: parse_u256("faucet_claims", &row.get::<String, _>("faucet_claims"))?,
        faucet_claimed_volume: parse_u256(
            "faucet_claimed_volume",
            &row.get::<String, _>("faucet_claimed_volume"),
        )?,
    })
}

pub async fn get_or_create_alliance(
    conn: &mut SqliteConnection,
    id: Address,
) -> Result<AllianceRecord, StoreError> {
    let row = sqlx::query("SELECT * FROM alliances WHERE id = ?")
        .bind(addr_key(id))
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => decode_alliance(&row),
        None => Ok(AllianceRecord::zeroed(id)),
    }
}

pub async fn save_alliance(
    conn: &mut SqliteConnection,
    alliance: &AllianceRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO alliances (
            id, token, admin, created_at, created_at_block, created_tx_hash,
            target_price, deadline, participants_count, funding_failed, state,
            deposits_count, total_deposited_volume, last_sale_price,
            nft_address, nft_token_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            token = excluded.token,
            admin = excluded.admin,
            created_at = excluded.created_at,
            created_at_block = excluded.created_at_block,
            created_tx_hash = excluded.created_tx_hash,
            target_price = excluded.target_price,
            deadline = excluded.deadline,
            participants_count = excluded.participants_count,
            funding_failed = excluded.funding_failed,
            state = excluded.state,
            deposits_count = excluded.deposits_count,
            total_deposited_volume = excluded.total_deposited_volume,
            last_sale_price = excluded.last_sale_price,
            nft_address = excluded.nft_address,
            nft_token_id = excluded.nft_token_id
        ",
    )
    .bind(addr_key(alliance.id))
    .bind(addr_key(alliance.token))
    .bind(addr_key(alliance.admin))
    .bind(i64::try_from(alliance.created_at).unwrap_or(i64::MAX))
    .bind(i64::try_from(alliance.created_at_block).unwrap_or(i64::MAX))
    .bind(format!("{:#x}", alliance.created_tx_hash))
    .bind(alliance.target_price.to_string())
    .bind(alliance.deadline.to_string())
    .bind(i64::from(alliance.participants_count))
    .bind(alliance.funding_failed)
    .bind(alliance.state as i64)
    .bind(alliance.deposits_count.to_string())
    .bind(alliance.total_deposited_volume.to_string())
    .bind(alliance.last_sale_price.map(|v| v.to_string()))
    .bind(alliance.nft_address.map(addr_key))
    .bind(alliance.nft_token_id.map(|v| v.to_string()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn alliance(
    pool: &SqlitePool,
    id: Address,
) -> Result<Option<AllianceRecord>, StoreError> {
    let row = sqlx::query("SELECT * FROM alliances WHERE id = ?")
        .bind(addr_key(id))
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(decode_alliance).transpose()
}

/// Alliances ordered by creation time, newest first.
pub async fn list_alliances(
    pool: &SqlitePool,
    limit: u32,
) -> Result<Vec<AllianceRecord>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM alliances ORDER BY created_at DESC, created_at_block DESC LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(decode_alliance).collect()
}

/// All tracked alliance addresses, oldest first; used to rebuild the
/// subscription registry and to scope event backfills after a restart.
pub async fn alliance_addresses(pool: &SqlitePool) -> Result<Vec<Address>, StoreError> {
    let rows = sqlx::query("SELECT id FROM alliances ORDER BY created_at ASC")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| parse_address("id", &row.get::<String, _>("id")))
        .collect()
}

fn decode_alliance(row: &sqlx::sqlite::SqliteRow) -> Result<AllianceRecord, StoreError> {
    let state_raw: i64 = row.get("state");
    let state = u8::try_from(state_raw)
        .ok()
        .and_then(AllianceState::from_u8)
        .ok_or(StoreError::InvalidColumn {
            column: "state",
            value: state_raw.to_string(),
        })?;

    let tx_hash_raw: String = row.get("created_tx_hash");
    let created_tx_hash =
        tx_hash_raw
            .parse::<B256>()
            .map_err(|_| StoreError::InvalidColumn {
                column: "created_tx_hash",
                value: tx_hash_raw.clone(),
            })?;

    Ok(AllianceRecord {
        id: parse_address("id", &row.get::<String, _>("id"))?,
        token: parse_address("token", &row.get::<String, _>("token"))?,
        admin: parse_address("admin", &row.get::<String, _>("admin"))?,
        created_at: u64::try_from(row.get::<i64, _>("created_at")).unwrap_or(0),
        created_at_block: u64::try_from(row.get::<i64, _>("created_at_block")).unwrap_or(0),
        created_tx_hash,
        target_price: parse_u256("target_price", &row.get::<String, _>("target_price"))?,
        deadline: parse_u256("deadline", &row.get::<String, _>("deadline"))?,
        participants_count: u32::try_from(row.get::<i64, _>("participants_count")).unwrap_or(0),
        funding_failed: row.get::<bool, _>("funding_failed"),
        state,
        deposits_count: parse_u256("deposits_count", &row.get::<String, _>("deposits_count"))?,
        total_deposited_volume: parse_u256(
            "total_deposited_volume",
            &row.get::<String, _>("total_deposited_volume"),
        )?,
        last_sale_price: parse_opt_u256("last_sale_price", row.get("last_sale_price"))?,
        nft_address: row
            .get::<Option<String>, _>("nft_address")
            .as_deref()
            .map(|v| parse_address("nft_address", v))
            .transpose()?,
        nft_token_id: parse_opt_u256("nft_token_id", row.get("nft_token_id"))?,
    })
}

pub async fn get_or_create_participant(
    conn: &mut SqliteConnection,
    alliance: Address,
    participant: Address,
) -> Result<ParticipantStats, StoreError> {
    let row = sqlx::query("SELECT * FROM participant_stats WHERE id = ?")
        .bind(ParticipantStats::composite_id(alliance, participant))
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => decode_participant(&row),
        None => Ok(ParticipantStats::zeroed(alliance, participant)),
    }
}

pub async fn save_participant(
    conn: &mut SqliteConnection,
    stats: &ParticipantStats,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO participant_stats (
            id, alliance, participant, deposited, refunds, votes, emergency_votes
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            deposited = excluded.deposited,
            refunds = excluded.refunds,
            votes = excluded.votes,
            emergency_votes = excluded.emergency_votes
        ",
    )
    .bind(ParticipantStats::composite_id(stats.alliance, stats.participant))
    .bind(addr_key(stats.alliance))
    .bind(addr_key(stats.participant))
    .bind(stats.deposited.to_string())
    .bind(stats.refunds.to_string())
    .bind(stats.votes.to_string())
    .bind(stats.emergency_votes.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn participant(
    pool: &SqlitePool,
    alliance: Address,
    participant: Address,
) -> Result<Option<ParticipantStats>, StoreError> {
    let row = sqlx::query("SELECT * FROM participant_stats WHERE id = ?")
        .bind(ParticipantStats::composite_id(alliance, participant))
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(decode_participant).transpose()
}

fn decode_participant(row: &sqlx::sqlite::SqliteRow) -> Result<ParticipantStats, StoreError> {
    Ok(ParticipantStats {
        alliance: parse_address("alliance", &row.get::<String, _>("alliance"))?,
        participant: parse_address("participant", &row.get::<String, _>("participant"))?,
        deposited: parse_u256("deposited", &row.get::<String, _>("deposited"))?,
        refunds: parse_u256("refunds", &row.get::<String, _>("refunds"))?,
        votes: parse_u256("votes", &row.get::<String, _>("votes"))?,
        emergency_votes: parse_u256("emergency_votes", &row.get::<String, _>("emergency_votes"))?,
    })
}

/// Inserts an immutable event record. Returns `true` when the row is new;
/// `false` means the same (tx_hash, log_index) was already recorded and the
/// caller must skip its aggregate deltas.
pub async fn insert_event_record(
    conn: &mut SqliteConnection,
    record: &EventRecord,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r"
        INSERT OR IGNORE INTO alliance_events (
            tx_hash, log_index, alliance, kind, block_number, block_timestamp, payload
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(format!("{:#x}", record.tx_hash))
    .bind(i64::try_from(record.log_index).unwrap_or(i64::MAX))
    .bind(addr_key(record.alliance))
    .bind(record.kind.as_str())
    .bind(i64::try_from(record.block_number).unwrap_or(i64::MAX))
    .bind(record.block_timestamp.and_then(|ts| i64::try_from(ts).ok()))
    .bind(serde_json::to_string(&record.payload)?)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Count and summed amount of recorded deposit events for one alliance.
pub async fn deposit_stats(
    pool: &SqlitePool,
    alliance: Address,
) -> Result<(u64, U256), StoreError> {
    let rows = sqlx::query("SELECT payload FROM alliance_events WHERE alliance = ? AND kind = ?")
        .bind(addr_key(alliance))
        .bind(EventKind::Deposit.as_str())
        .fetch_all(pool)
        .await?;

    let mut total = U256::ZERO;
    for row in &rows {
        let payload: serde_json::Value = serde_json::from_str(&row.get::<String, _>("payload"))?;
        let amount = payload
            .get("amount")
            .and_then(|v| v.as_str())
            .ok_or(StoreError::InvalidColumn {
                column: "payload.amount",
                value: payload.to_string(),
            })?;
        total += parse_u256("payload.amount", amount)?;
    }

    Ok((rows.len() as u64, total))
}
