//! JSON wire types for the structured query interface. The rocket API
//! serves these and [`crate::gateway::IndexedSource`] consumes them, so
//! both ends of the protocol share one set of serde definitions.
//!
//! uint256 values travel as decimal strings; JSON numbers cannot carry
//! them losslessly.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize};

use crate::store::{AllianceRecord, Protocol, state_hint};

/// Request body of `POST /query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "lowercase")]
pub enum QueryRequest {
    /// Up to `limit` alliances ordered by creation time, newest first.
    Alliances { limit: u32 },
    /// The protocol singleton.
    Protocol,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alliances: Option<Vec<AllianceRow>>,
    /// `Some(None)` means the singleton does not exist yet (no events seen).
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "double_option"
    )]
    pub protocol: Option<Option<ProtocolRow>>,
}

/// Maps an explicitly present `null` to `Some(None)` so the
/// absent-singleton state survives a JSON round trip; an absent field
/// still deserializes to the outer `None` via `default`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceRow {
    pub id: Address,
    pub state: u8,
    pub state_hint: String,
    pub target_price: String,
    pub total_deposited_volume: String,
    pub deadline: String,
    pub participants_count: u32,
    pub nft_address: Option<Address>,
    pub nft_token_id: Option<String>,
}

impl From<&AllianceRecord> for AllianceRow {
    fn from(record: &AllianceRecord) -> Self {
        let state = record.state as u8;
        Self {
            id: record.id,
            state,
            state_hint: state_hint(state).to_string(),
            target_price: record.target_price.to_string(),
            total_deposited_volume: record.total_deposited_volume.to_string(),
            deadline: record.deadline.to_string(),
            participants_count: record.participants_count,
            nft_address: record.nft_address,
            nft_token_id: record.nft_token_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRow {
    pub alliances_created: String,
    pub deposits_count: String,
    pub deposits_volume: String,
    pub sales_executed: String,
    pub faucet_claims: String,
    pub faucet_claimed_volume: String,
}

impl From<&Protocol> for ProtocolRow {
    fn from(protocol: &Protocol) -> Self {
        Self {
            alliances_created: protocol.alliances_created.to_string(),
            deposits_count: protocol.deposits_count.to_string(),
            deposits_volume: protocol.deposits_volume.to_string(),
            sales_executed: protocol.sales_executed.to_string(),
            faucet_claims: protocol.faucet_claims.to_string(),
            faucet_claimed_volume: protocol.faucet_claimed_volume.to_string(),
        }
    }
}

/// Parses a decimal (or 0x-prefixed hex) uint256 wire field.
pub fn parse_wire_u256(field: &'static str, value: &str) -> Result<U256, String> {
    value
        .parse::<U256>()
        .map_err(|_| format!("field {field} is not a uint256: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn query_request_wire_format() {
        let request = QueryRequest::Alliances { limit: 50 };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"query": "alliances", "limit": 50}));

        let request = QueryRequest::Protocol;
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"query": "protocol"}));
    }

    #[test]
    fn alliance_row_uses_decimal_strings() {
        let mut record = crate::store::AllianceRecord::zeroed(address!(
            "0x1111111111111111111111111111111111111111"
        ));
        record.target_price = U256::from(1_000);
        record.total_deposited_volume = U256::from(400);

        let row = AllianceRow::from(&record);
        assert_eq!(row.target_price, "1000");
        assert_eq!(row.total_deposited_volume, "400");
        assert_eq!(row.state_hint, "Funding");
        assert_eq!(row.nft_token_id, None);
    }

    #[test]
    fn wire_u256_accepts_decimal_and_hex() {
        assert_eq!(parse_wire_u256("x", "1000").unwrap(), U256::from(1_000));
        assert_eq!(parse_wire_u256("x", "0x3e8").unwrap(), U256::from(1_000));
        assert!(parse_wire_u256("x", "not-a-number").is_err());
    }
}
