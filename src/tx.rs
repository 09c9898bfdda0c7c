//! Guarded transaction submission for the alliance write surface.
//!
//! Every write follows the same pipeline: estimate gas, pad the estimate,
//! submit with an explicit gas limit, wait for the receipt, and treat a
//! reverted receipt as an error. Each attempt is single-shot; nonce
//! management and confirmation tracking stay with the signing provider.

use alloy::contract::{CallBuilder, CallDecoder};
use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionReceipt;
use futures_util::future::BoxFuture;
use tracing::info;

use crate::bindings::{Alliance, AllianceFactory, FATKFaucet, IERC20};
use crate::error::TxError;

/// Called after every confirmed write so the read path can re-warm itself.
/// [`crate::gateway::Gateway::refresh_hook`] builds one from a gateway.
pub type RefreshHook = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Estimates are padded by 20% to absorb state drift between estimation
/// and inclusion.
const GAS_PADDING_NUM: u64 = 120;
const GAS_PADDING_DEN: u64 = 100;

/// Hard ceiling on the padded gas limit, below typical block gas limits.
const TX_GAS_CAP: u64 = 15_000_000;

/// Pads a gas estimate by the standard margin, capped at [`TX_GAS_CAP`].
pub fn pad_gas(estimate: u64) -> u64 {
    // u128 keeps the multiply exact for estimates near u64::MAX.
    let padded = u128::from(estimate) * u128::from(GAS_PADDING_NUM) / u128::from(GAS_PADDING_DEN);
    u64::try_from(padded).unwrap_or(TX_GAS_CAP).min(TX_GAS_CAP)
}

/// Runs one call through the estimate/pad/submit/confirm pipeline.
pub async fn send_guarded<P, D>(
    call: CallBuilder<P, D, Ethereum>,
) -> Result<TransactionReceipt, TxError>
where
    P: Provider,
    D: CallDecoder,
{
    let estimate = call.estimate_gas().await.map_err(TxError::Estimate)?;
    let gas_limit = pad_gas(estimate);

    let pending = call.gas(gas_limit).send().await.map_err(TxError::Submit)?;
    let receipt = pending.get_receipt().await?;

    if !receipt.status() {
        return Err(TxError::Reverted {
            tx_hash: receipt.transaction_hash,
        });
    }

    info!(
        tx_hash = %receipt.transaction_hash,
        gas_limit,
        "transaction confirmed"
    );
    Ok(receipt)
}

/// Thin, uniformly guarded wrappers over the contract write surface. The
/// provider is expected to carry a signer.
pub struct TxOrchestrator<P> {
    provider: P,
    refresh: Option<RefreshHook>,
}

impl<P: Provider + Clone> TxOrchestrator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            refresh: None,
        }
    }

    /// Attaches the post-confirmation refresh hook. It runs after every
    /// successful receipt and never after a failure.
    pub fn with_refresh(mut self, hook: RefreshHook) -> Self {
        self.refresh = Some(hook);
        self
    }

    /// Pipeline shared by every wrapper: guarded submission, then the
    /// refresh hook once the receipt confirms success.
    async fn submit<P2, D>(
        &self,
        call: CallBuilder<P2, D, Ethereum>,
    ) -> Result<TransactionReceipt, TxError>
    where
        P2: Provider,
        D: CallDecoder,
    {
        let receipt = send_guarded(call).await?;
        self.run_refresh().await;
        Ok(receipt)
    }

    async fn run_refresh(&self) {
        if let Some(hook) = &self.refresh {
            hook().await;
        }
    }

    pub async fn create_alliance(
        &self,
        factory: Address,
        target_price: U256,
        deadline: U256,
        participants: Vec<Address>,
        shares: Vec<U256>,
        token: Address,
    ) -> Result<TransactionReceipt, TxError> {
        let factory = AllianceFactory::new(factory, self.provider.clone());
        self.submit(factory.createAlliance(target_price, deadline, participants, shares, token))
            .await
    }

    pub async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, TxError> {
        let token = IERC20::new(token, self.provider.clone());
        self.submit(token.approve(spender, amount)).await
    }

    pub async fn deposit(
        &self,
        alliance: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).deposit(amount)).await
    }

    pub async fn cancel_funding(&self, alliance: Address) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).cancelFunding()).await
    }

    pub async fn withdraw_refund(&self, alliance: Address) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).withdrawRefund()).await
    }

    pub async fn buy_nft(
        &self,
        alliance: Address,
        nft_address: Address,
        token_id: U256,
        seller: Address,
    ) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).buyNFT(nft_address, token_id, seller)).await
    }

    pub async fn vote_to_sell(
        &self,
        alliance: Address,
        buyer: Address,
        price: U256,
        sale_deadline: U256,
    ) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).voteToSell(buyer, price, sale_deadline)).await
    }

    pub async fn reset_sale_proposal(
        &self,
        alliance: Address,
    ) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).resetSaleProposal()).await
    }

    pub async fn execute_sale(&self, alliance: Address) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).executeSale()).await
    }

    pub async fn vote_emergency_withdraw(
        &self,
        alliance: Address,
        recipient: Address,
    ) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).voteEmergencyWithdraw(recipient)).await
    }

    pub async fn emergency_withdraw_nft(
        &self,
        alliance: Address,
    ) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).emergencyWithdrawNFT()).await
    }

    pub async fn pause(&self, alliance: Address) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).pause()).await
    }

    pub async fn unpause(&self, alliance: Address) -> Result<TransactionReceipt, TxError> {
        self.submit(self.alliance(alliance).unpause()).await
    }

    pub async fn claim_faucet(&self, faucet: Address) -> Result<TransactionReceipt, TxError> {
        let faucet = FATKFaucet::new(faucet, self.provider.clone());
        self.submit(faucet.claim()).await
    }

    fn alliance(&self, address: Address) -> Alliance::AllianceInstance<P> {
        Alliance::new(address, self.provider.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use alloy::providers::{ProviderBuilder, mock::Asserter};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook(fired: &Arc<AtomicUsize>) -> RefreshHook {
        let fired = Arc::clone(fired);
        Box::new(move || {
            let fired = Arc::clone(&fired);
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn refresh_hook_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let provider = ProviderBuilder::new().connect_mocked_client(Asserter::new());
        let orchestrator = TxOrchestrator::new(provider).with_refresh(counting_hook(&fired));

        orchestrator.run_refresh().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_estimation_skips_the_refresh_hook() {
        let fired = Arc::new(AtomicUsize::new(0));
        let asserter = Asserter::new();
        asserter.push_failure_msg("execution reverted");
        let provider = ProviderBuilder::new().connect_mocked_client(asserter);
        let orchestrator = TxOrchestrator::new(provider).with_refresh(counting_hook(&fired));

        let err = orchestrator
            .deposit(
                address!("0x2222222222222222222222222222222222222222"),
                U256::from(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::Estimate(_)));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn estimates_are_padded_by_twenty_percent() {
        assert_eq!(pad_gas(100_000), 120_000);
        assert_eq!(pad_gas(0), 0);
        assert_eq!(pad_gas(1), 1);
    }

    #[test]
    fn padded_estimates_never_exceed_the_cap() {
        assert_eq!(pad_gas(TX_GAS_CAP), TX_GAS_CAP);
        assert_eq!(pad_gas(30_000_000), TX_GAS_CAP);
        assert_eq!(pad_gas(u64::MAX), TX_GAS_CAP);
    }
}
