//! Read path backed by the structured query endpoint of the indexer.

use alloy::primitives::Address;
use async_trait::async_trait;
use url::Url;

use crate::error::GatewayError;
use crate::wire::{AllianceRow, ProtocolRow, QueryRequest, QueryResponse, parse_wire_u256};

use super::{AllianceSummary, AllianceSummarySource, NftMedia, ProtocolSummary};

pub struct IndexedSource {
    endpoint: Url,
    client: reqwest::Client,
}

impl IndexedSource {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, GatewayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

pub(super) fn row_to_summary(row: &AllianceRow) -> Result<AllianceSummary, GatewayError> {
    let nft_token_id = row
        .nft_token_id
        .as_deref()
        .map(|id| parse_wire_u256("nft_token_id", id))
        .transpose()
        .map_err(GatewayError::IndexResponse)?;

    Ok(AllianceSummary {
        address: row.id,
        state: row.state,
        state_hint: row.state_hint.clone(),
        target_price: parse_wire_u256("target_price", &row.target_price)
            .map_err(GatewayError::IndexResponse)?,
        total_deposited: parse_wire_u256("total_deposited_volume", &row.total_deposited_volume)
            .map_err(GatewayError::IndexResponse)?,
        deadline: parse_wire_u256("deadline", &row.deadline)
            .map_err(GatewayError::IndexResponse)?,
        participants_count: row.participants_count,
        nft_address: row.nft_address.filter(|a| *a != Address::ZERO),
        nft_token_id,
        media: NftMedia::default(),
    })
}

fn protocol_to_summary(row: &ProtocolRow) -> Result<ProtocolSummary, GatewayError> {
    Ok(ProtocolSummary {
        alliances_created: parse_wire_u256("alliances_created", &row.alliances_created)
            .map_err(GatewayError::IndexResponse)?,
        deposits_count: parse_wire_u256("deposits_count", &row.deposits_count)
            .map_err(GatewayError::IndexResponse)?,
        deposits_volume: parse_wire_u256("deposits_volume", &row.deposits_volume)
            .map_err(GatewayError::IndexResponse)?,
        sales_executed: parse_wire_u256("sales_executed", &row.sales_executed)
            .map_err(GatewayError::IndexResponse)?,
        faucet_claims: parse_wire_u256("faucet_claims", &row.faucet_claims)
            .map_err(GatewayError::IndexResponse)?,
        faucet_claimed_volume: parse_wire_u256(
            "faucet_claimed_volume",
            &row.faucet_claimed_volume,
        )
        .map_err(GatewayError::IndexResponse)?,
    })
}

#[async_trait]
impl AllianceSummarySource for IndexedSource {
    async fn list_alliances(&self, limit: u32) -> Result<Vec<AllianceSummary>, GatewayError> {
        let response = self.query(&QueryRequest::Alliances { limit }).await?;
        let rows = response.alliances.ok_or_else(|| {
            GatewayError::IndexResponse("alliances query returned no alliances field".to_string())
        })?;
        rows.iter().map(row_to_summary).collect()
    }

    async fn protocol_summary(&self) -> Result<ProtocolSummary, GatewayError> {
        let response = self.query(&QueryRequest::Protocol).await?;
        let row = response.protocol.ok_or_else(|| {
            GatewayError::IndexResponse("protocol query returned no protocol field".to_string())
        })?;
        // An absent singleton means no event was ever indexed: all zeros.
        match row {
            Some(row) => protocol_to_summary(&row),
            None => Ok(ProtocolSummary::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{U256, address};

    fn sample_row() -> AllianceRow {
        AllianceRow {
            id: address!("0x2222222222222222222222222222222222222222"),
            state: 1,
            state_hint: "Acquired".to_string(),
            target_price: "1000".to_string(),
            total_deposited_volume: "1000".to_string(),
            deadline: "4000000000".to_string(),
            participants_count: 3,
            nft_address: Some(address!("0x4444444444444444444444444444444444444444")),
            nft_token_id: Some("7".to_string()),
        }
    }

    #[test]
    fn rows_parse_into_summaries() {
        let summary = row_to_summary(&sample_row()).unwrap();
        assert_eq!(summary.state_hint, "Acquired");
        assert_eq!(summary.target_price, U256::from(1_000));
        assert_eq!(summary.nft_token_id, Some(U256::from(7)));
        assert_eq!(summary.media, NftMedia::default());
    }

    #[test]
    fn zero_nft_address_is_normalized_to_none() {
        let mut row = sample_row();
        row.nft_address = Some(Address::ZERO);
        let summary = row_to_summary(&row).unwrap();
        assert_eq!(summary.nft_address, None);
    }

    #[test]
    fn malformed_counter_is_rejected() {
        let mut row = sample_row();
        row.target_price = "not-a-number".to_string();
        let err = row_to_summary(&row).unwrap_err();
        assert!(matches!(err, GatewayError::IndexResponse(_)));
    }
}
