//! テスト共通ヘルパー: モックbeaconcha.inサーバーとテスト用GatewayState。

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use blocklander_crypto::{self as crypto, Address, SecretKey};
use blocklander_types::OwnershipPayload;

use crate::authority::{MintDomain, SignatureAuthority};
use crate::config::{GatewayState, Secret};
use crate::oracle::beaconchain::BeaconchainClient;
use crate::oracle::{EligibilityOracle, ValidatorSelection};

pub const TEST_API_KEY: &str = "test-beaconchain-key";
pub const TEST_SIGNER_KEY: &str =
    "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const TEST_CONTRACT: &str = "0x1111111111111111111111111111111111111111";

/// モックbeaconcha.inのチェーンデータ。
#[derive(Default)]
pub struct MockChain {
    /// 小文字hexアドレス → validatorIndex（返却順）
    validators: HashMap<String, Vec<u64>>,
    /// validatorIndex → 提案ブロック数
    blocks: HashMap<u64, usize>,
    fail: bool,
    error_status: bool,
    /// 応答前の待ち時間
    delay: Duration,
    hits: AtomicUsize,
}

impl MockChain {
    pub fn with_validators(mut self, address: Address, indices: &[u64]) -> Self {
        self.validators
            .insert(crypto::to_hex(address.as_slice()), indices.to_vec());
        self
    }

    pub fn with_blocks(mut self, validator_index: u64, count: usize) -> Self {
        self.blocks.insert(validator_index, count);
        self
    }

    /// 全リクエストにHTTP 500を返す
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// HTTP 200だがエンベロープのstatusが非OK
    pub fn error_status() -> Self {
        Self {
            error_status: true,
            ..Default::default()
        }
    }

    /// 全リクエストで `delay` 待ってから応答する
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// 受信したリクエスト数
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn reject(&self, query: &HashMap<String, String>) -> Option<Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if query.get("apikey").map(String::as_str) != Some(TEST_API_KEY) {
            return Some((StatusCode::UNAUTHORIZED, "invalid apikey").into_response());
        }
        if self.fail {
            return Some((StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response());
        }
        if self.error_status {
            return Some(
                Json(serde_json::json!({
                    "status": "ERROR: API rate limit exceeded",
                    "data": null
                }))
                .into_response(),
            );
        }
        None
    }
}

async fn withdrawal_credentials(
    State(chain): State<Arc<MockChain>>,
    Path(address): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    tokio::time::sleep(chain.delay).await;
    if let Some(rejection) = chain.reject(&query) {
        return rejection;
    }
    let data: Vec<serde_json::Value> = chain
        .validators
        .get(&address.to_lowercase())
        .map(|indices| {
            indices
                .iter()
                .map(|i| serde_json::json!({ "publickey": format!("0x{i:096x}"), "validatorindex": i }))
                .collect()
        })
        .unwrap_or_default();
    Json(serde_json::json!({ "status": "OK", "data": data })).into_response()
}

async fn produced_blocks(
    State(chain): State<Arc<MockChain>>,
    Path(index): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    tokio::time::sleep(chain.delay).await;
    if let Some(rejection) = chain.reject(&query) {
        return rejection;
    }
    let count = chain.blocks.get(&index).copied().unwrap_or(0) as u64;
    let data: Vec<serde_json::Value> = (0..count)
        .map(|n| {
            let number = 20_000_000 - n;
            serde_json::json!({
                "blockHash": format!("0x{number:064x}"),
                "blockNumber": number,
                "timestamp": 1_700_000_000 + number,
                "feeRecipient": TEST_CONTRACT,
                "txCount": 120,
                "posConsensus": {
                    "executionBlockNumber": number,
                    "proposerIndex": index,
                    "slot": 9_000_000 - n,
                    "epoch": (9_000_000 - n) / 32,
                    "finalized": true
                }
            })
        })
        .collect();
    Json(serde_json::json!({ "status": "OK", "data": data })).into_response()
}

/// モックbeaconcha.inサーバーを起動し、ポートとチェーンデータへの参照を返す。
pub async fn start_mock_beaconchain(chain: MockChain) -> (u16, Arc<MockChain>) {
    let chain = Arc::new(chain);
    let app = axum::Router::new()
        .route(
            "/api/v1/validator/withdrawalCredentials/{address}",
            axum::routing::get(withdrawal_credentials),
        )
        .route(
            "/api/v1/execution/{index}/produced",
            axum::routing::get(produced_blocks),
        )
        .with_state(chain.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, chain)
}

pub fn test_authority() -> SignatureAuthority {
    SignatureAuthority::from_key_material(&Secret::new(TEST_SIGNER_KEY)).unwrap()
}

pub fn test_payload() -> OwnershipPayload {
    OwnershipPayload::new("base", "blockLander")
}

/// テスト用GatewayStateを構築するヘルパー（Base mainnet, tokenId "1"）
pub fn test_state(base_url: &str, selection: ValidatorSelection) -> Arc<GatewayState> {
    test_state_with_timeout(base_url, selection, Duration::from_secs(5))
}

/// チェーンデータAPIのタイムアウトを指定して構築する
pub fn test_state_with_timeout(
    base_url: &str,
    selection: ValidatorSelection,
    timeout: Duration,
) -> Arc<GatewayState> {
    let source = BeaconchainClient::new(
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap(),
        base_url.trim_end_matches('/').to_string(),
        Secret::new(TEST_API_KEY),
    );
    Arc::new(GatewayState {
        authority: test_authority(),
        oracle: EligibilityOracle::new(Box::new(source), selection),
        domain: MintDomain::new(
            "blockLander",
            "1",
            8453,
            Address::from_str(TEST_CONTRACT).unwrap(),
        ),
        ownership_payload: test_payload(),
    })
}

/// ランダムなウォレットを生成する
pub fn test_wallet() -> (SecretKey, Address) {
    let key = SecretKey::new(&mut rand::rngs::OsRng);
    let address = crypto::address_of(&key);
    (key, address)
}

/// 所有権証明（正規メッセージへのpersonal_sign）を作る
pub fn sign_ownership(key: &SecretKey, payload: &OwnershipPayload) -> String {
    let signature = crypto::sign_message(key, payload.canonical_message().as_bytes());
    crypto::to_hex(&signature.to_bytes())
}
