//! Off-chain NFT metadata resolution: tokenURI → {image, name, description}.
//!
//! Enrichment is strictly best-effort. Every failure mode — revert, bad
//! URI, unreachable gateway, malformed JSON — degrades to empty media;
//! nothing in the read path depends on this succeeding.

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bindings::IERC721Metadata;

const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMedia {
    pub token_uri: Option<String>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Rewrites `ipfs://` URIs to an HTTP gateway URL; anything else passes
/// through untouched.
pub fn normalize_ipfs(uri: &str) -> String {
    match uri.strip_prefix("ipfs://") {
        Some(path) => format!("{IPFS_GATEWAY}{path}"),
        None => uri.to_string(),
    }
}

/// Decodes an inline `data:application/json` URI, plain (percent-encoded)
/// or base64. Returns `None` for anything that is not valid inline JSON.
pub fn parse_data_json_uri(uri: &str) -> Option<serde_json::Value> {
    if !uri.starts_with("data:application/json") {
        return None;
    }

    let (meta, payload) = uri.split_once(',')?;

    let decoded = if meta.contains(";base64") {
        let bytes = BASE64.decode(payload).ok()?;
        String::from_utf8(bytes).ok()?
    } else {
        percent_decode_str(payload).decode_utf8().ok()?.into_owned()
    };

    serde_json::from_str(&decoded).ok()
}

async fn fetch_json(client: &reqwest::Client, token_uri: &str) -> Option<serde_json::Value> {
    if let Some(inlined) = parse_data_json_uri(token_uri) {
        return inlined.is_object().then_some(inlined);
    }

    let url = normalize_ipfs(token_uri);
    let response = client.get(&url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.json().await.ok()
}

fn as_string(value: Option<&serde_json::Value>) -> Option<String> {
    value.and_then(|v| v.as_str()).map(str::to_string)
}

/// Resolves the media for one asset reference. A zero address or zero token
/// id short-circuits to empty media.
pub async fn load_media<P: Provider + Clone>(
    client: &reqwest::Client,
    provider: &P,
    nft_address: Address,
    token_id: U256,
) -> NftMedia {
    if nft_address == Address::ZERO || token_id == U256::ZERO {
        return NftMedia::default();
    }

    let contract = IERC721Metadata::new(nft_address, provider.clone());
    let token_uri = match contract.tokenURI(token_id).call().await {
        Ok(uri) => uri,
        Err(e) => {
            debug!(%nft_address, %token_id, "tokenURI read failed: {e}");
            return NftMedia::default();
        }
    };

    let Some(metadata) = fetch_json(client, &token_uri).await else {
        return NftMedia {
            token_uri: Some(token_uri),
            ..NftMedia::default()
        };
    };

    let image_raw =
        as_string(metadata.get("image")).or_else(|| as_string(metadata.get("image_url")));

    NftMedia {
        token_uri: Some(token_uri),
        image: image_raw.as_deref().map(normalize_ipfs),
        name: as_string(metadata.get("name")),
        description: as_string(metadata.get("description")),
    }
}
