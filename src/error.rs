//! Domain-specific error types, one enum per concern so database, ledger,
//! and business-rule failures never blur together.

use alloy::primitives::{Address, B256, U256};
use alloy::transports::{RpcError, TransportErrorKind};

/// Errors talking to the ledger through alloy.
#[derive(Debug, thiserror::Error)]
pub enum AlloyError {
    #[error("contract call failed: {0}")]
    Contract(#[from] alloy::contract::Error),
    #[error("sol type error: {0}")]
    SolType(#[from] alloy::sol_types::Error),
    #[error("RPC transport error: {0}")]
    RpcTransport(#[from] RpcError<TransportErrorKind>),
}

/// Aggregate store persistence and decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("stored value for {column} is not decodable: {value}")]
    InvalidColumn { column: &'static str, value: String },
    #[error("event payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors raised while turning ledger logs into aggregate mutations.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("alloy error: {0}")]
    Alloy(#[from] AlloyError),
    #[error("log is missing its {0} field")]
    MissingLogField(&'static str),
    #[error("undecodable {kind} log at {tx_hash:#x}: {source}")]
    UndecodableLog {
        kind: &'static str,
        tx_hash: B256,
        source: alloy::sol_types::Error,
    },
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

impl From<RpcError<TransportErrorKind>> for IngestError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        Self::Alloy(AlloyError::RpcTransport(err))
    }
}

/// Read-path errors for the dual-source query gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(
        "{label} is not deployed at {address}. If the chain was reset, redeploy \
         the contracts and update the configured addresses."
    )]
    ContractUnavailable { label: &'static str, address: Address },
    #[error("index query failed: {0}")]
    IndexQuery(#[from] reqwest::Error),
    #[error("index returned a malformed response: {0}")]
    IndexResponse(String),
    #[error("ledger read failed: {0}")]
    Ledger(#[from] AlloyError),
}

impl From<alloy::contract::Error> for GatewayError {
    fn from(err: alloy::contract::Error) -> Self {
        Self::Ledger(AlloyError::Contract(err))
    }
}

impl From<RpcError<TransportErrorKind>> for GatewayError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        Self::Ledger(AlloyError::RpcTransport(err))
    }
}

/// A named deposit guard condition that the ledger would reject. These are
/// user-facing strings; each one cites the numeric boundary where one exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("deposit failed: caller is not a participant of this alliance")]
    NotParticipant,
    #[error("deposit failed: alliance is not in Funding state (state = {state})")]
    NotFunding { state: u8 },
    #[error("deposit failed: alliance is paused")]
    Paused,
    #[error("deposit failed: funding window is over (deadline = {deadline})")]
    DeadlinePassed { deadline: U256 },
    #[error("deposit failed: amount exceeds remaining target (remaining = {remaining})")]
    ExceedsRemaining { remaining: U256 },
    #[error("deposit failed: insufficient token balance (balance = {balance})")]
    InsufficientBalance { balance: U256 },
    #[error("deposit failed: allowance is too low, approve at least {required}")]
    InsufficientAllowance { required: U256 },
}

/// Precondition validation outcome: a named rejection, or a read failure
/// that prevented the guards from being evaluated at all.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Rejected(#[from] ValidationFailure),
    #[error("precondition read failed: {0}")]
    Read(#[from] AlloyError),
}

impl From<alloy::contract::Error> for ValidatorError {
    fn from(err: alloy::contract::Error) -> Self {
        Self::Read(AlloyError::Contract(err))
    }
}

impl From<RpcError<TransportErrorKind>> for ValidatorError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        Self::Read(AlloyError::RpcTransport(err))
    }
}

/// Transaction submission errors. Estimation and submission failures are
/// surfaced verbatim; there is no retry.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    #[error("gas estimation failed: {0}")]
    Estimate(#[source] alloy::contract::Error),
    #[error("transaction submission failed: {0}")]
    Submit(#[source] alloy::contract::Error),
    #[error("confirmation wait failed: {0}")]
    Confirmation(#[from] alloy::providers::PendingTransactionError),
    #[error("transaction reverted: {tx_hash:#x}")]
    Reverted { tx_hash: B256 },
}
