//! Rocket routes exposing the aggregate store's structured query interface.

use alloy::providers::DynProvider;
use chrono::{DateTime, Utc};
use rocket::serde::json::Json;
use rocket::{Route, State, get, post, routes};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::error;

use crate::gateway::{AllianceSummary, Gateway, ProtocolSummary};
use crate::store;
use crate::wire::{AllianceRow, ProtocolRow, QueryRequest, QueryResponse};

/// Callers may not ask for unbounded result sets.
const MAX_ALLIANCES_LIMIT: u32 = 1_000;

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
}

#[get("/health")]
fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize, Deserialize)]
struct QueryError {
    error: String,
}

#[post("/query", format = "json", data = "<request>")]
async fn query(
    request: Json<QueryRequest>,
    pool: &State<SqlitePool>,
) -> Result<Json<QueryResponse>, Json<QueryError>> {
    match request.into_inner() {
        QueryRequest::Alliances { limit } => {
            let limit = limit.min(MAX_ALLIANCES_LIMIT);
            let records = store::list_alliances(pool.inner(), limit).await.map_err(|e| {
                error!("Alliance query failed: {e}");
                Json(QueryError {
                    error: e.to_string(),
                })
            })?;

            Ok(Json(QueryResponse {
                alliances: Some(records.iter().map(AllianceRow::from).collect()),
                protocol: None,
            }))
        }
        QueryRequest::Protocol => {
            let protocol = store::protocol(pool.inner()).await.map_err(|e| {
                error!("Protocol query failed: {e}");
                Json(QueryError {
                    error: e.to_string(),
                })
            })?;

            Ok(Json(QueryResponse {
                alliances: None,
                protocol: Some(protocol.as_ref().map(ProtocolRow::from)),
            }))
        }
    }
}

/// Dual-source reads: these answer from the index when one is configured
/// and fall back to direct ledger reads, unlike `POST /query`, which is
/// the raw index itself.
#[get("/alliances?<limit>")]
async fn alliances(
    limit: Option<u32>,
    gateway: &State<Gateway<DynProvider>>,
) -> Result<Json<Vec<AllianceSummary>>, Json<QueryError>> {
    let limit = limit.unwrap_or(MAX_ALLIANCES_LIMIT).min(MAX_ALLIANCES_LIMIT);
    gateway.list_alliances(limit).await.map(Json).map_err(|e| {
        error!("Alliance read failed: {e}");
        Json(QueryError {
            error: e.to_string(),
        })
    })
}

#[get("/protocol")]
async fn protocol_summary(
    gateway: &State<Gateway<DynProvider>>,
) -> Result<Json<ProtocolSummary>, Json<QueryError>> {
    gateway.protocol_summary().await.map(Json).map_err(|e| {
        error!("Protocol read failed: {e}");
        Json(QueryError {
            error: e.to_string(),
        })
    })
}

pub fn api_routes() -> Vec<Route> {
    routes![health, query]
}

pub fn gateway_routes() -> Vec<Route> {
    routes![alliances, protocol_summary]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{EventBody, apply_event};
    use crate::test_utils::{deposit_event, raw_event_at, setup_test_db};
    use alloy::primitives::address;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;

    async fn test_client(pool: SqlitePool) -> Client {
        let rocket = rocket::build()
            .mount("/", api_routes())
            .manage(pool);
        Client::tracked(rocket).await.unwrap()
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let client = test_client(setup_test_db().await).await;

        let response = client.get("/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let body: HealthResponse = response.into_json().await.unwrap();
        assert_eq!(body.status, "healthy");
    }

    #[tokio::test]
    async fn alliances_query_returns_rows_newest_first() {
        let pool = setup_test_db().await;
        let older = address!("0x1111111111111111111111111111111111111111");
        let newer = address!("0x2222222222222222222222222222222222222222");

        for (i, alliance) in [older, newer].into_iter().enumerate() {
            let mut event = raw_event_at(
                alliance,
                10 + i as u64,
                0,
                EventBody::AllianceCreated {
                    token: address!("0x5555555555555555555555555555555555555555"),
                    admin: address!("0x6666666666666666666666666666666666666666"),
                },
            );
            event.block_timestamp = Some(1_700_000_000 + i as u64);
            apply_event(&pool, &event).await.unwrap();
        }
        apply_event(
            &pool,
            &deposit_event(
                older,
                address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
                400,
                5,
            ),
        )
        .await
        .unwrap();

        let client = test_client(pool).await;
        let response = client
            .post("/query")
            .header(ContentType::JSON)
            .body(r#"{"query":"alliances","limit":10}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body: QueryResponse = response.into_json().await.unwrap();
        let rows = body.alliances.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, newer);
        assert_eq!(rows[1].id, older);
        assert_eq!(rows[1].total_deposited_volume, "400");
        assert_eq!(rows[0].state_hint, "Funding");
    }

    #[tokio::test]
    async fn alliances_route_serves_ledger_fallback() {
        use alloy::primitives::{Address, Bytes, U256};
        use alloy::providers::{Provider, ProviderBuilder, mock::Asserter};
        use alloy::sol_types::SolCall;

        use crate::bindings::{Alliance, AllianceFactory};
        use crate::gateway::LedgerSource;

        let factory = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
        let alliance_addr = address!("0x2222222222222222222222222222222222222222");

        let asserter = Asserter::new();
        asserter.push_success(&Bytes::from(vec![0x60]));
        asserter.push_success(&Bytes::from(
            AllianceFactory::getAllAlliancesCall::abi_encode_returns(&vec![alliance_addr]),
        ));
        asserter.push_success(&Bytes::from(Alliance::stateCall::abi_encode_returns(&0u8)));
        asserter.push_success(&Bytes::from(Alliance::targetPriceCall::abi_encode_returns(
            &U256::from(1_000),
        )));
        asserter.push_success(&Bytes::from(
            Alliance::totalDepositedCall::abi_encode_returns(&U256::from(400)),
        ));
        asserter.push_success(&Bytes::from(Alliance::deadlineCall::abi_encode_returns(
            &U256::from(4_000_000_000_u64),
        )));
        asserter.push_success(&Bytes::from(
            Alliance::getParticipantsCall::abi_encode_returns(&vec![address!(
                "0x3333333333333333333333333333333333333333"
            )]),
        ));
        asserter.push_success(&Bytes::from(Alliance::nftAddressCall::abi_encode_returns(
            &Address::ZERO,
        )));
        asserter.push_success(&Bytes::from(Alliance::tokenIdCall::abi_encode_returns(
            &U256::ZERO,
        )));
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter)
            .erased();

        // No index configured: the route must serve straight ledger reads.
        let gateway = Gateway::new(None, LedgerSource::new(provider.clone(), factory), provider);
        let rocket = rocket::build().mount("/", gateway_routes()).manage(gateway);
        let client = Client::tracked(rocket).await.unwrap();

        let response = client.get("/alliances?limit=5").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let body: serde_json::Value = response.into_json().await.unwrap();
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["state_hint"], "Funding");
        assert_eq!(rows[0]["participants_count"], 1);
    }

    #[tokio::test]
    async fn protocol_query_is_null_before_first_event() {
        let client = test_client(setup_test_db().await).await;

        let response = client
            .post("/query")
            .header(ContentType::JSON)
            .body(r#"{"query":"protocol"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body: QueryResponse = response.into_json().await.unwrap();
        assert_eq!(body.protocol, Some(None));
    }

    #[tokio::test]
    async fn protocol_query_returns_counters() {
        let pool = setup_test_db().await;
        apply_event(
            &pool,
            &deposit_event(
                address!("0x1111111111111111111111111111111111111111"),
                address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
                250,
                0,
            ),
        )
        .await
        .unwrap();

        let client = test_client(pool).await;
        let response = client
            .post("/query")
            .header(ContentType::JSON)
            .body(r#"{"query":"protocol"}"#)
            .dispatch()
            .await;

        let body: QueryResponse = response.into_json().await.unwrap();
        let protocol = body.protocol.unwrap().unwrap();
        assert_eq!(protocol.deposits_count, "1");
        assert_eq!(protocol.deposits_volume, "250");
        assert_eq!(protocol.sales_executed, "0");
    }
}
