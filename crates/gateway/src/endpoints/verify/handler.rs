//! # /api/verify メインハンドラ

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use tracing::Instrument;

use blocklander_types::{VerifyQuery, VerifyResponse};

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::oracle::Lookup;
use crate::ownership::verify_ownership_proof;

use super::parse_address;

/// GET /api/verify — 資格確認とミント認可署名の発行。
pub async fn handle_verify(
    State(state): State<Arc<GatewayState>>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<Json<VerifyResponse>, GatewayError> {
    let Query(query) = query.map_err(|e| GatewayError::BadRequest(e.body_text()))?;

    let request_id = uuid::Uuid::new_v4();
    verify(&state, &query)
        .instrument(tracing::info_span!("verify", %request_id))
        .await
        .map(Json)
}

/// 資格確認の本体。
///
/// - 資格なし（バリデータなし・提案履歴なし）: `signature: null`
/// - チェーンデータAPI失敗: `GatewayError::LookupFailed`（資格なしとは区別する）
pub async fn verify(
    state: &GatewayState,
    query: &VerifyQuery,
) -> Result<VerifyResponse, GatewayError> {
    // Step 1. アドレス
    let address = parse_address(&query.address)?;
    let checksummed = address.to_checksum(None);

    // Step 2. 所有権証明（オラクル検索より前）
    verify_ownership_proof(&state.ownership_payload, address, &query.user_signature).map_err(
        |e| {
            tracing::warn!(address = %checksummed, error = %e, "所有権証明を拒否");
            e
        },
    )?;

    // Step 3. 資格オラクル
    let ineligible = VerifyResponse {
        address: checksummed.clone(),
        validator_index: None,
        signature: None,
    };
    let record = match state.oracle.lookup(address).await {
        Ok(Lookup::Found(record)) if record.has_proposed() => record,
        Ok(Lookup::Found(record)) => {
            tracing::info!(
                address = %checksummed,
                validator_index = record.validator_index,
                "提案履歴なし"
            );
            return Ok(ineligible);
        }
        Ok(Lookup::NotFound) => {
            tracing::info!(address = %checksummed, "バリデータが見つからない");
            return Ok(ineligible);
        }
        Err(e) => {
            tracing::warn!(address = %checksummed, error = %e, "資格確認に失敗");
            return Err(e.into());
        }
    };

    // Step 4. 認可署名
    let authorization =
        state
            .authority
            .authorize(address, record.validator_index, &state.domain.separator)?;

    tracing::info!(
        address = %checksummed,
        validator_index = record.validator_index,
        produced_blocks = record.produced_blocks.len(),
        "ミント認可を発行"
    );

    Ok(VerifyResponse {
        address: checksummed,
        validator_index: Some(record.validator_index),
        signature: Some(authorization.to_wire()),
    })
}
