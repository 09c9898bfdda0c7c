use alloy::primitives::Address;
use alloy::providers::Provider;

use crate::error::GatewayError;

/// Confirms bytecode exists at `address` before any contract interaction.
///
/// A locally restarted devnet keeps the old deployment addresses in client
/// configuration while the chain itself is empty, which otherwise surfaces
/// as opaque decode errors on the first read.
pub async fn ensure_contract_deployed<P: Provider>(
    provider: &P,
    address: Address,
    label: &'static str,
) -> Result<(), GatewayError> {
    let code = provider
        .get_code_at(address)
        .await
        .map_err(crate::error::AlloyError::from)?;

    if code.is_empty() {
        return Err(GatewayError::ContractUnavailable { label, address });
    }

    Ok(())
}
