//! Dual-source read gateway.
//!
//! Read traffic goes to the indexed query endpoint when one is configured;
//! a failure there falls back exactly once to direct ledger reads. Both
//! sources produce the same [`AllianceSummary`] shape, so callers never
//! learn which path answered. NFT media enrichment runs after either path.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::GatewayError;
use crate::nft::{self, NftMedia};

mod indexed;
mod ledger;

pub use indexed::IndexedSource;
pub use ledger::LedgerSource;

/// One alliance as served to read clients, whichever source produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllianceSummary {
    pub address: Address,
    pub state: u8,
    pub state_hint: String,
    pub target_price: U256,
    pub total_deposited: U256,
    pub deadline: U256,
    pub participants_count: u32,
    pub nft_address: Option<Address>,
    pub nft_token_id: Option<U256>,
    #[serde(flatten)]
    pub media: NftMedia,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolSummary {
    pub alliances_created: U256,
    pub deposits_count: U256,
    pub deposits_volume: U256,
    pub sales_executed: U256,
    pub faucet_claims: U256,
    pub faucet_claimed_volume: U256,
}

/// One read path capable of answering the summary queries.
#[async_trait]
pub trait AllianceSummarySource: Send + Sync {
    async fn list_alliances(&self, limit: u32) -> Result<Vec<AllianceSummary>, GatewayError>;

    async fn protocol_summary(&self) -> Result<ProtocolSummary, GatewayError>;
}

/// Primary/fallback pair with uniform post-read NFT enrichment.
pub struct Gateway<P> {
    indexed: Option<IndexedSource>,
    ledger: LedgerSource<P>,
    provider: P,
    http: reqwest::Client,
}

impl<P: Provider + Clone + Send + Sync> Gateway<P> {
    pub fn new(indexed: Option<IndexedSource>, ledger: LedgerSource<P>, provider: P) -> Self {
        Self {
            indexed,
            ledger,
            provider,
            http: reqwest::Client::new(),
        }
    }

    /// Source selection comes straight from configuration: a configured
    /// `query_endpoint` enables the indexed path, its absence means every
    /// read goes to the ledger.
    pub fn from_config(config: &Config, provider: P) -> Self {
        let indexed = config.query_endpoint.clone().map(IndexedSource::new);
        let ledger = LedgerSource::new(provider.clone(), config.evm.factory);
        Self::new(indexed, ledger, provider)
    }

    pub async fn list_alliances(
        &self,
        limit: u32,
    ) -> Result<Vec<AllianceSummary>, GatewayError> {
        let mut summaries = self
            .with_fallback(
                |source| source.list_alliances(limit),
                |ledger| ledger.list_alliances(limit),
            )
            .await?;

        for summary in &mut summaries {
            if let (Some(nft_address), Some(token_id)) =
                (summary.nft_address, summary.nft_token_id)
            {
                summary.media =
                    nft::load_media(&self.http, &self.provider, nft_address, token_id).await;
            }
        }

        Ok(summaries)
    }

    pub async fn protocol_summary(&self) -> Result<ProtocolSummary, GatewayError> {
        self.with_fallback(
            |source| source.protocol_summary(),
            |ledger| ledger.protocol_summary(),
        )
        .await
    }

    /// Packages [`Self::refresh`] as the orchestrator's post-confirmation
    /// hook.
    pub fn refresh_hook(self: &Arc<Self>, limit: u32) -> crate::tx::RefreshHook
    where
        P: 'static,
    {
        let gateway = Arc::clone(self);
        Box::new(move || {
            let gateway = Arc::clone(&gateway);
            Box::pin(async move { gateway.refresh(limit).await })
        })
    }

    /// Re-runs both summary queries after a confirmed write so the next
    /// page load is warm. The index may still lag the ledger by a block or
    /// two; failures here are logged, never surfaced.
    pub async fn refresh(&self, limit: u32) {
        if let Err(e) = self.list_alliances(limit).await {
            debug!("post-transaction alliance refresh failed: {e}");
        }
        if let Err(e) = self.protocol_summary().await {
            debug!("post-transaction protocol refresh failed: {e}");
        }
    }

    /// Runs the query against the index when configured, falling back once
    /// to the ledger on failure. The error of the last path attempted is
    /// the one the caller sees.
    async fn with_fallback<'a, T, IF, LF>(
        &'a self,
        via_index: impl FnOnce(&'a IndexedSource) -> IF,
        via_ledger: impl FnOnce(&'a LedgerSource<P>) -> LF,
    ) -> Result<T, GatewayError>
    where
        IF: Future<Output = Result<T, GatewayError>>,
        LF: Future<Output = Result<T, GatewayError>>,
    {
        match &self.indexed {
            Some(indexed) => match via_index(indexed).await {
                Ok(result) => Ok(result),
                Err(primary) => {
                    warn!("index query failed, falling back to ledger reads: {primary}");
                    via_ledger(&self.ledger).await
                }
            },
            None => via_ledger(&self.ledger).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, address};
    use alloy::providers::{ProviderBuilder, mock::Asserter};
    use alloy::sol_types::SolCall;
    use url::Url;

    use crate::bindings::{Alliance, AllianceFactory};

    const FACTORY: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
    const ALLIANCE: Address = address!("0x2222222222222222222222222222222222222222");

    fn push_return(asserter: &Asserter, data: Vec<u8>) {
        asserter.push_success(&Bytes::from(data));
    }

    fn push_alliance_reads(asserter: &Asserter) {
        // getCode for the factory health probe, then getAllAlliances, then
        // the per-alliance reads in ledger::read_summary order.
        asserter.push_success(&Bytes::from(vec![0x60]));
        push_return(
            asserter,
            AllianceFactory::getAllAlliancesCall::abi_encode_returns(&vec![ALLIANCE]),
        );
        push_return(asserter, Alliance::stateCall::abi_encode_returns(&0u8));
        push_return(
            asserter,
            Alliance::targetPriceCall::abi_encode_returns(&U256::from(1_000)),
        );
        push_return(
            asserter,
            Alliance::totalDepositedCall::abi_encode_returns(&U256::from(400)),
        );
        push_return(
            asserter,
            Alliance::deadlineCall::abi_encode_returns(&U256::from(4_000_000_000_u64)),
        );
        push_return(
            asserter,
            Alliance::getParticipantsCall::abi_encode_returns(&vec![address!(
                "0x3333333333333333333333333333333333333333"
            )]),
        );
        push_return(
            asserter,
            Alliance::nftAddressCall::abi_encode_returns(&Address::ZERO),
        );
        push_return(asserter, Alliance::tokenIdCall::abi_encode_returns(&U256::ZERO));
    }

    #[tokio::test]
    async fn both_sources_produce_the_same_summary_for_the_same_state() {
        use crate::store::state_hint;
        use crate::wire::AllianceRow;

        const NFT: Address = address!("0x4444444444444444444444444444444444444444");

        // Ledger path: one Acquired alliance read straight from contracts.
        let asserter = Asserter::new();
        asserter.push_success(&Bytes::from(vec![0x60]));
        push_return(
            &asserter,
            AllianceFactory::getAllAlliancesCall::abi_encode_returns(&vec![ALLIANCE]),
        );
        push_return(&asserter, Alliance::stateCall::abi_encode_returns(&1u8));
        push_return(
            &asserter,
            Alliance::targetPriceCall::abi_encode_returns(&U256::from(1_000)),
        );
        push_return(
            &asserter,
            Alliance::totalDepositedCall::abi_encode_returns(&U256::from(1_000)),
        );
        push_return(
            &asserter,
            Alliance::deadlineCall::abi_encode_returns(&U256::from(4_000_000_000_u64)),
        );
        push_return(
            &asserter,
            Alliance::getParticipantsCall::abi_encode_returns(&vec![address!(
                "0x3333333333333333333333333333333333333333"
            )]),
        );
        push_return(&asserter, Alliance::nftAddressCall::abi_encode_returns(&NFT));
        push_return(&asserter, Alliance::tokenIdCall::abi_encode_returns(&U256::from(7)));
        let provider = ProviderBuilder::new().connect_mocked_client(asserter);

        let mut via_ledger = LedgerSource::new(provider, FACTORY)
            .list_alliances(10)
            .await
            .unwrap();
        assert_eq!(via_ledger.len(), 1);

        // Indexed path: the same state as the wire row the index would serve.
        let row = AllianceRow {
            id: ALLIANCE,
            state: 1,
            state_hint: state_hint(1).to_string(),
            target_price: "1000".to_string(),
            total_deposited_volume: "1000".to_string(),
            deadline: "4000000000".to_string(),
            participants_count: 1,
            nft_address: Some(NFT),
            nft_token_id: Some("7".to_string()),
        };
        let via_index = indexed::row_to_summary(&row).unwrap();

        assert_eq!(via_ledger.remove(0), via_index);
    }

    #[tokio::test]
    async fn unreachable_index_falls_back_to_ledger() {
        let asserter = Asserter::new();
        push_alliance_reads(&asserter);
        let provider = ProviderBuilder::new().connect_mocked_client(asserter);

        // Nothing listens on this port; the index query fails fast.
        let endpoint = Url::parse("http://127.0.0.1:9/query").unwrap();
        let gateway = Gateway::new(
            Some(IndexedSource::new(endpoint)),
            LedgerSource::new(provider.clone(), FACTORY),
            provider,
        );

        let summaries = gateway.list_alliances(50).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].address, ALLIANCE);
        assert_eq!(summaries[0].state_hint, "Funding");
        assert_eq!(summaries[0].total_deposited, U256::from(400));
        assert_eq!(summaries[0].nft_address, None);
        assert_eq!(summaries[0].media, NftMedia::default());
    }

    #[tokio::test]
    async fn ledger_is_used_directly_when_no_index_is_configured() {
        let asserter = Asserter::new();
        push_alliance_reads(&asserter);
        let provider = ProviderBuilder::new().connect_mocked_client(asserter);

        let gateway = Gateway::new(None, LedgerSource::new(provider.clone(), FACTORY), provider);

        let summaries = gateway.list_alliances(50).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].target_price, U256::from(1_000));
    }

    #[tokio::test]
    async fn both_paths_fail_surfaces_the_ledger_error() {
        // Factory code probe returns empty bytecode: the fallback fails too
        // and its error is the one the caller sees.
        let asserter = Asserter::new();
        asserter.push_success(&Bytes::new());
        let provider = ProviderBuilder::new().connect_mocked_client(asserter);

        let endpoint = Url::parse("http://127.0.0.1:9/query").unwrap();
        let gateway = Gateway::new(
            Some(IndexedSource::new(endpoint)),
            LedgerSource::new(provider.clone(), FACTORY),
            provider,
        );

        let err = gateway.list_alliances(50).await.unwrap_err();
        assert!(matches!(err, GatewayError::ContractUnavailable { .. }));
    }
}
