//! HTTP routes of a petchain node.

use crate::error::{ApiError, ApiResult};
use crate::peer::{ChainResponse, HttpPeerClient};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use petchain_chain::{NodeState, NodeStats, PetRecord, SearchQuery, SubmitReceipt};
use petchain_core::{PetId, Transaction, TxKind};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub node: Arc<NodeState>,
    pub peers: HttpPeerClient,
}

impl AppState {
    pub fn new(node: Arc<NodeState>, peers: HttpPeerClient) -> Self {
        Self { node, peers }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/transactions/new", post(new_transaction))
        .route("/transactions/pending", get(pending_transactions))
        .route("/mine", get(mine))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve_conflicts))
        .route("/pets/search", get(search_pets))
        .route("/pets/:id", get(get_pet))
        .route("/pets/:id/lost", post(report_lost))
        .route("/pets/:id/found", post(report_found))
        .route("/pets/:id/history", get(pet_history))
        .route("/stats", get(stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn new_transaction(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> ApiResult<(StatusCode, Json<SubmitReceipt>)> {
    let receipt = state.node.submit_transaction(tx)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn pending_transactions(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let transactions = state.node.pending_transactions()?;
    Ok(Json(json!({
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

async fn mine(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let node = Arc::clone(&state.node);
    let block = tokio::task::spawn_blocking(move || node.mine()).await??;
    Ok(Json(json!({
        "message": "New block forged",
        "block": block,
    })))
}

async fn full_chain(State(state): State<AppState>) -> ApiResult<Json<ChainResponse>> {
    let chain = state.node.get_chain()?;
    Ok(Json(ChainResponse {
        length: chain.len(),
        chain,
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterNodes {
    #[serde(default)]
    nodes: Vec<String>,
}

async fn register_nodes(
    State(state): State<AppState>,
    Json(body): Json<RegisterNodes>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if body.nodes.is_empty() {
        return Err(ApiError::BadRequest("supply a list of nodes".into()));
    }
    let mut added = Vec::with_capacity(body.nodes.len());
    for address in &body.nodes {
        added.push(state.node.register_node(address)?);
    }
    let total_nodes = state.node.nodes()?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "New nodes have been added",
            "added": added,
            "total_nodes": total_nodes,
        })),
    ))
}

async fn resolve_conflicts(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let nodes = state.node.nodes()?;
    let chains = state.peers.fetch_all(&nodes).await;

    let node = Arc::clone(&state.node);
    let resolution = tokio::task::spawn_blocking(move || node.resolve_conflicts(&chains)).await??;
    let chain = state.node.get_chain()?;
    Ok(Json(json!({
        "resolution": resolution,
        "length": chain.len(),
        "chain": chain,
    })))
}

async fn get_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
) -> ApiResult<Json<PetRecord>> {
    Ok(Json(state.node.get_pet(&PetId::new(pet_id))?))
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    lost_only: bool,
}

async fn search_pets(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let query = SearchQuery::new(&params.q).lost_only(params.lost_only);
    let results = state.node.search_pets(&query)?;
    Ok(Json(json!({
        "count": results.len(),
        "results": results,
    })))
}

/// Reject a signed event posted under the wrong pet or route.
fn check_event(path_id: &str, tx: &Transaction, kind: TxKind) -> ApiResult<()> {
    if tx.pet_id.as_str() != path_id {
        return Err(ApiError::BadRequest(format!(
            "transaction is for pet {}, not {}",
            tx.pet_id, path_id
        )));
    }
    if tx.kind() != kind {
        return Err(ApiError::BadRequest(format!(
            "expected a {} transaction, got {}",
            kind,
            tx.kind()
        )));
    }
    Ok(())
}

async fn report_lost(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
    Json(tx): Json<Transaction>,
) -> ApiResult<(StatusCode, Json<SubmitReceipt>)> {
    check_event(&pet_id, &tx, TxKind::ReportLost)?;
    let receipt = state.node.submit_transaction(tx)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn report_found(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
    Json(tx): Json<Transaction>,
) -> ApiResult<(StatusCode, Json<SubmitReceipt>)> {
    check_event(&pet_id, &tx, TxKind::ReportFound)?;
    let receipt = state.node.submit_transaction(tx)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    #[serde(default)]
    include_pending: bool,
}

async fn pet_history(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Value>> {
    let pet_id = PetId::new(pet_id);
    let history = state.node.get_history(&pet_id, params.include_pending)?;
    Ok(Json(json!({
        "pet_id": pet_id,
        "count": history.len(),
        "history": history,
    })))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<NodeStats>> {
    Ok(Json(state.node.get_stats()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use petchain_chain::{Ledger, LedgerConfig};
    use petchain_core::{FoundReport, Keypair, LostReport, PetProfile};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let ledger = Ledger::new(LedgerConfig::with_difficulty(1)).unwrap();
        let node = Arc::new(NodeState::new("test-node", ledger));
        let peers = HttpPeerClient::new(Duration::from_secs(1)).unwrap();
        build_router(AppState::new(node, peers))
    }

    fn register_tx(owner: &Keypair, id: &str, name: &str) -> Transaction {
        Transaction::register(id.into(), owner.fingerprint(), PetProfile::new(name, "Ann", "555"))
            .unwrap()
            .signed(owner)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Vec<u8>>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let req = builder.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn post_json<T: serde::Serialize>(app: &Router, uri: &str, body: &T) -> (StatusCode, Value) {
        send(app, "POST", uri, Some(serde_json::to_vec(body).unwrap())).await
    }

    #[tokio::test]
    async fn test_register_mine_and_fetch_pet() {
        let app = app();
        let owner = Keypair::generate();

        let (status, receipt) = post_json(&app, "/transactions/new", &register_tx(&owner, "P1", "Max")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(receipt["pending_count"], 1);
        assert_eq!(receipt["expected_block"], 1);

        let (status, mined) = send(&app, "GET", "/mine", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mined["block"]["index"], 1);
        assert_eq!(mined["block"]["transaction_count"], 2);

        let (status, pet) = send(&app, "GET", "/pets/P1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pet["profile"]["name"], "Max");
        assert_eq!(pet["status"], "active");

        let (status, chain) = send(&app, "GET", "/chain", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(chain["length"], 2);
    }

    #[tokio::test]
    async fn test_mine_with_empty_pool() {
        let app = app();
        let (status, body) = send(&app, "GET", "/mine", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_foreign_signature_unauthorized() {
        let app = app();
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let tx = Transaction::register("P1".into(), owner.fingerprint(), PetProfile::new("Max", "Ann", "555"))
            .unwrap()
            .signed(&stranger);

        let (status, _) = post_json(&app, "/transactions/new", &tx).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, pending) = send(&app, "GET", "/transactions/pending", None).await;
        assert_eq!(pending["count"], 0);
    }

    #[tokio::test]
    async fn test_duplicate_submission_conflicts() {
        let app = app();
        let owner = Keypair::generate();
        let tx = register_tx(&owner, "P1", "Max");

        post_json(&app, "/transactions/new", &tx).await;
        let (status, _) = post_json(&app, "/transactions/new", &tx).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_pet_not_found() {
        let app = app();
        let (status, _) = send(&app, "GET", "/pets/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/pets/missing/history", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lost_and_found_routes() {
        let app = app();
        let owner = Keypair::generate();
        let finder = Keypair::generate();
        post_json(&app, "/transactions/new", &register_tx(&owner, "P1", "Max")).await;
        send(&app, "GET", "/mine", None).await;

        let lost = Transaction::report_lost("P1".into(), owner.fingerprint(), LostReport::default())
            .unwrap()
            .signed(&owner);

        // Route and payload must agree.
        let (status, _) = post_json(&app, "/pets/P2/lost", &lost).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = post_json(&app, "/pets/P1/found", &lost).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(&app, "/pets/P1/lost", &lost).await;
        assert_eq!(status, StatusCode::CREATED);
        send(&app, "GET", "/mine", None).await;

        let (_, results) = send(&app, "GET", "/pets/search?q=max&lost_only=true", None).await;
        assert_eq!(results["count"], 1);

        let found = Transaction::report_found(
            "P1".into(),
            owner.fingerprint(),
            FoundReport {
                finder_contact: "555-0199".into(),
            },
        )
        .unwrap()
        .signed(&finder);
        let (status, _) = post_json(&app, "/pets/P1/found", &found).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, history) = send(&app, "GET", "/pets/P1/history?include_pending=true", None).await;
        assert_eq!(history["count"], 3);
        assert_eq!(history["history"][2]["pending"], true);

        send(&app, "GET", "/mine", None).await;
        let (_, pet) = send(&app, "GET", "/pets/P1", None).await;
        assert_eq!(pet["status"], "found");
    }

    #[tokio::test]
    async fn test_search_without_query_lists_all() {
        let app = app();
        let owner = Keypair::generate();
        post_json(&app, "/transactions/new", &register_tx(&owner, "b", "Bella")).await;
        post_json(&app, "/transactions/new", &register_tx(&owner, "a", "Max")).await;
        send(&app, "GET", "/mine", None).await;

        let (status, results) = send(&app, "GET", "/pets/search", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results["count"], 2);
        assert_eq!(results["results"][0]["pet_id"], "a");
    }

    #[tokio::test]
    async fn test_register_nodes() {
        let app = app();

        let (status, _) = post_json(&app, "/nodes/register", &json!({ "nodes": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(&app, "/nodes/register", &json!({ "nodes": ["no-port"] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(
            &app,
            "/nodes/register",
            &json!({ "nodes": ["http://127.0.0.1:5002", "127.0.0.1:5002/chain"] }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["total_nodes"], json!(["127.0.0.1:5002"]));
    }

    #[tokio::test]
    async fn test_resolve_without_peers_keeps_chain() {
        let app = app();
        let (status, body) = send(&app, "GET", "/nodes/resolve", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resolution"]["outcome"], "kept");
        assert_eq!(body["length"], 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let app = app();
        let owner = Keypair::generate();
        post_json(&app, "/transactions/new", &register_tx(&owner, "P1", "Max")).await;

        let (status, stats) = send(&app, "GET", "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["node_id"], "test-node");
        assert_eq!(stats["pending_count"], 1);
        assert_eq!(stats["pet_count"], 0);
    }
}
