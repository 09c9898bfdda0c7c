//! Read path that recomputes summaries straight from contract state.
//!
//! This is the fallback when no index is reachable. Per-alliance reads
//! are issued sequentially per contract but concurrently across
//! alliances. Counters the ledger cannot reconstruct without a full log
//! scan (deposit counts, faucet totals) stay zero in the protocol
//! summary; only the index knows those.

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use async_trait::async_trait;
use futures_util::future::try_join_all;

use crate::bindings::{Alliance, AllianceFactory};
use crate::error::GatewayError;
use crate::health::ensure_contract_deployed;
use crate::store::state_hint;

use super::{AllianceSummary, AllianceSummarySource, NftMedia, ProtocolSummary};

pub struct LedgerSource<P> {
    provider: P,
    factory: Address,
}

impl<P: Provider + Clone + Send + Sync> LedgerSource<P> {
    pub fn new(provider: P, factory: Address) -> Self {
        Self { provider, factory }
    }

    async fn alliance_addresses(&self) -> Result<Vec<Address>, GatewayError> {
        ensure_contract_deployed(&self.provider, self.factory, "AllianceFactory").await?;
        let factory = AllianceFactory::new(self.factory, self.provider.clone());
        Ok(factory.getAllAlliances().call().await?)
    }

    async fn read_summary(&self, address: Address) -> Result<AllianceSummary, GatewayError> {
        let alliance = Alliance::new(address, self.provider.clone());

        let state = alliance.state().call().await?;
        let target_price = alliance.targetPrice().call().await?;
        let total_deposited = alliance.totalDeposited().call().await?;
        let deadline = alliance.deadline().call().await?;
        let participants = alliance.getParticipants().call().await?;
        let nft_address = alliance.nftAddress().call().await?;
        let nft_token_id = alliance.tokenId().call().await?;

        let has_nft = nft_address != Address::ZERO && nft_token_id != U256::ZERO;

        Ok(AllianceSummary {
            address,
            state,
            state_hint: state_hint(state).to_string(),
            target_price,
            total_deposited,
            deadline,
            participants_count: u32::try_from(participants.len()).unwrap_or(u32::MAX),
            nft_address: has_nft.then_some(nft_address),
            nft_token_id: has_nft.then_some(nft_token_id),
            media: NftMedia::default(),
        })
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync> AllianceSummarySource for LedgerSource<P> {
    async fn list_alliances(&self, limit: u32) -> Result<Vec<AllianceSummary>, GatewayError> {
        // The factory appends on creation; newest-first means reading the
        // tail in reverse.
        let mut addresses = self.alliance_addresses().await?;
        addresses.reverse();
        addresses.truncate(limit as usize);

        try_join_all(addresses.into_iter().map(|address| self.read_summary(address))).await
    }

    async fn protocol_summary(&self) -> Result<ProtocolSummary, GatewayError> {
        let addresses = self.alliance_addresses().await?;
        let summaries =
            try_join_all(addresses.into_iter().map(|address| self.read_summary(address))).await?;

        let deposits_volume = summaries
            .iter()
            .fold(U256::ZERO, |acc, s| acc.saturating_add(s.total_deposited));
        let sales_executed = summaries
            .iter()
            .filter(|s| s.state == crate::store::AllianceState::Closed as u8)
            .count();

        Ok(ProtocolSummary {
            alliances_created: U256::from(summaries.len()),
            deposits_volume,
            sales_executed: U256::from(sales_executed),
            ..ProtocolSummary::default()
        })
    }
}
