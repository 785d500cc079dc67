use crate::config::ApiConfig;
use crate::core::{Block, Ledger, UtxoEntry};
use crate::mining::CancelFlag;
use crate::{LedgerError, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub height: u64,
    pub tip: String,
    pub difficulty: usize,
    pub total_supply: u64,
    pub block_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: String,
    pub height: u64,
    pub previous_hash: String,
    pub timestamp: String,
    pub nonce: String,
    pub size: usize,
    pub transaction_count: usize,
    pub transactions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub address: String,
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationInfo {
    pub valid: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    pub value: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressRequest {
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

pub struct RestApi {
    ledger: Arc<Ledger>,
    config: ApiConfig,
}

impl RestApi {
    pub fn new(ledger: Arc<Ledger>, config: ApiConfig) -> Self {
        Self { ledger, config }
    }

    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        log::info!("🚀 Starting ledger REST API on {}", addr);

        let app = self.create_router();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| LedgerError::Network(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("✅ REST API listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| LedgerError::Network(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn create_router(&self) -> Router {
        let state = AppState {
            ledger: self.ledger.clone(),
        };

        let router = Router::new()
            .route("/", get(get_blockchain).post(write_block))
            .route("/balance", post(get_balance))
            .route("/api/v1/info", get(get_chain_info))
            .route("/api/v1/blocks/latest", get(get_latest_block))
            .route("/api/v1/addresses/:address/balance", get(get_address_balance))
            .route("/api/v1/addresses/:address/utxos", get(get_address_utxos))
            .route("/api/v1/mine", post(mine_block))
            .route("/api/v1/validate", get(validate_chain))
            .route("/health", get(health_check));

        let router = if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_methods(Any)
                .allow_headers(Any)
                .allow_origin(Any);
            router.layer(ServiceBuilder::new().layer(cors))
        } else {
            router
        };

        router.with_state(state)
    }
}

fn error_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InsufficientFunds { .. } | LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LedgerError::BlockRejected(_) => StatusCode::CONFLICT,
        LedgerError::SealCancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T>(result: Result<T>, ok: StatusCode) -> ApiResult<T> {
    match result {
        Ok(data) => (ok, Json(ApiResponse::success(data))),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                log::error!("Request failed: {}", e);
            }
            (status, Json(ApiResponse::error(e.to_string())))
        }
    }
}

fn block_info(block: &Block, height: u64) -> BlockInfo {
    BlockInfo {
        hash: block.hash.clone(),
        height,
        previous_hash: block.prev_hash.clone(),
        timestamp: block.timestamp.clone(),
        nonce: block.nonce.clone(),
        size: block.size(),
        transaction_count: block.transaction_count(),
        transactions: block.transactions.iter().map(|tx| tx.id.clone()).collect(),
    }
}

async fn health_check() -> Json<ApiResponse<HashMap<String, String>>> {
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

    Json(ApiResponse::success(status))
}

async fn get_blockchain(State(state): State<AppState>) -> ApiResult<Vec<Block>> {
    respond(state.ledger.get_chain(), StatusCode::OK)
}

async fn write_block(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> ApiResult<Block> {
    // A dropped connection drops this future, which stops the search.
    let cancel = CancelFlag::new();
    let _guard = cancel.cancel_on_drop();

    let result = state
        .ledger
        .submit_transfer_with_cancel(&request.from, &request.to, request.value, cancel)
        .await;
    respond(result, StatusCode::CREATED)
}

async fn get_balance(
    State(state): State<AppState>,
    Json(request): Json<AddressRequest>,
) -> ApiResult<BalanceInfo> {
    let result = state.ledger.get_balance(&request.address).map(|balance| BalanceInfo {
        address: request.address.clone(),
        balance,
    });
    respond(result, StatusCode::OK)
}

async fn get_address_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<BalanceInfo> {
    let result = state
        .ledger
        .get_balance(&address)
        .map(|balance| BalanceInfo { address, balance });
    respond(result, StatusCode::OK)
}

async fn get_address_utxos(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Vec<UtxoEntry>> {
    respond(state.ledger.get_utxos(&address), StatusCode::OK)
}

async fn get_chain_info(State(state): State<AppState>) -> ApiResult<ChainInfo> {
    let result = state.ledger.snapshot().map(|snapshot| ChainInfo {
        height: snapshot.height(),
        tip: snapshot.tail().hash.clone(),
        difficulty: state.ledger.difficulty(),
        total_supply: snapshot.utxo_set().get_total_supply(),
        block_count: snapshot.len(),
    });
    respond(result, StatusCode::OK)
}

async fn get_latest_block(State(state): State<AppState>) -> ApiResult<BlockInfo> {
    let result = state
        .ledger
        .snapshot()
        .map(|snapshot| block_info(snapshot.tail(), snapshot.height()));
    respond(result, StatusCode::OK)
}

async fn mine_block(
    State(state): State<AppState>,
    Json(request): Json<AddressRequest>,
) -> ApiResult<Block> {
    let cancel = CancelFlag::new();
    let _guard = cancel.cancel_on_drop();

    let result = state
        .ledger
        .mine_reward_with_cancel(&request.address, cancel)
        .await;
    respond(result, StatusCode::CREATED)
}

async fn validate_chain(State(state): State<AppState>) -> ApiResult<ValidationInfo> {
    // Rehashes every block, so keep it off the async workers.
    let ledger = state.ledger.clone();
    let result = tokio::task::spawn_blocking(move || ledger.verify_chain())
        .await
        .map_err(|e| LedgerError::Task(format!("chain validation did not complete: {}", e)))
        .map(|verdict| match verdict {
            Ok(()) => ValidationInfo {
                valid: true,
                error: None,
            },
            Err(e) => ValidationInfo {
                valid: false,
                error: Some(e.to_string()),
            },
        });
    respond(result, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        let ledger = Arc::new(Ledger::new(&LedgerConfig::default()).unwrap());
        RestApi::new(ledger, ApiConfig::default()).create_router()
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_chain() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = call(router(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_and_balance() {
        let app = router();

        let (status, body) = call(
            app.clone(),
            post_json("/", serde_json::json!({ "from": "Ivan", "to": "Bob", "value": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 1);

        let (status, body) = call(app, post_json("/balance", serde_json::json!({ "address": "Bob" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balance"], 3);
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_bad_request() {
        let (status, body) = call(
            router(),
            post_json("/", serde_json::json!({ "from": "Ivan", "to": "Bob", "value": 50 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("Insufficient funds"));
    }

    #[tokio::test]
    async fn test_validate_endpoint() {
        let request = Request::builder().uri("/api/v1/validate").body(Body::empty()).unwrap();
        let (status, body) = call(router(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["valid"], true);
    }

    #[tokio::test]
    async fn test_mine_endpoint() {
        let app = router();

        let (status, body) = call(
            app.clone(),
            post_json("/api/v1/mine", serde_json::json!({ "address": "Miner" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 1);

        let request = Request::builder()
            .uri("/api/v1/addresses/Miner/balance")
            .body(Body::empty())
            .unwrap();
        let (_, body) = call(app.clone(), request).await;
        assert_eq!(body["data"]["balance"], 10);

        let (status, _) = call(app, post_json("/api/v1/mine", serde_json::json!({ "address": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
