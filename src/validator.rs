//! Client-side deposit preconditions, checked in the same order the
//! contract checks them so the rejection a user sees names the guard the
//! ledger would have tripped first.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::transports::TransportErrorKind;
use tracing::debug;

use crate::bindings::{Alliance, IERC20};
use crate::error::{ValidationFailure, ValidatorError};
use crate::store::AllianceState;

/// Evaluates every deposit guard against current contract state. Reads are
/// performed lazily, so the first failing guard short-circuits the rest.
///
/// The deadline is judged against the latest block timestamp, the same
/// clock the contract will use, so a chain whose time drifts from the
/// host's wall clock still validates consistently.
pub async fn validate_deposit<P: Provider + Clone>(
    provider: &P,
    alliance_address: Address,
    caller: Address,
    amount: U256,
) -> Result<(), ValidatorError> {
    let alliance = Alliance::new(alliance_address, provider.clone());

    if !alliance.isParticipant(caller).call().await? {
        return Err(ValidationFailure::NotParticipant.into());
    }

    let state = alliance.state().call().await?;
    if state != AllianceState::Funding as u8 {
        return Err(ValidationFailure::NotFunding { state }.into());
    }

    if alliance.isPaused().call().await? {
        return Err(ValidationFailure::Paused.into());
    }

    let deadline = alliance.deadline().call().await?;
    let now = latest_block_timestamp(provider).await?;
    if now >= deadline {
        return Err(ValidationFailure::DeadlinePassed { deadline }.into());
    }

    let target_price = alliance.targetPrice().call().await?;
    let total_deposited = alliance.totalDeposited().call().await?;
    let remaining = target_price.saturating_sub(total_deposited);
    if amount > remaining {
        return Err(ValidationFailure::ExceedsRemaining { remaining }.into());
    }

    let token_address = alliance.token().call().await?;
    let token = IERC20::new(token_address, provider.clone());

    let balance = token.balanceOf(caller).call().await?;
    if balance < amount {
        return Err(ValidationFailure::InsufficientBalance { balance }.into());
    }

    let allowance = token.allowance(caller, alliance_address).call().await?;
    if allowance < amount {
        return Err(ValidationFailure::InsufficientAllowance { required: amount }.into());
    }

    debug!(%alliance_address, %caller, %amount, "deposit preconditions satisfied");
    Ok(())
}

async fn latest_block_timestamp<P: Provider>(provider: &P) -> Result<U256, ValidatorError> {
    let block = provider
        .get_block_by_number(BlockNumberOrTag::Latest)
        .await?
        .ok_or_else(|| TransportErrorKind::custom_str("latest block unavailable"))?;
    Ok(U256::from(block.header.timestamp))
}
