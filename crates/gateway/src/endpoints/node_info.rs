//! # GET /.well-known/blocklander-info
//!
//! 認可者情報公開エンドポイント。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use blocklander_crypto as crypto;
use blocklander_types::AuthorityInfo;

use crate::config::GatewayState;

/// GET /.well-known/blocklander-info — 認可者情報公開。
///
/// クライアントが署名者アドレスとドメインセパレータを事前に確認できるようにする。
/// 秘密鍵に関する情報は公開アドレス以外返さない。
pub async fn handle_authority_info(State(state): State<Arc<GatewayState>>) -> Json<AuthorityInfo> {
    let domain = &state.domain;
    Json(AuthorityInfo {
        signer_address: state.authority.address().to_checksum(None),
        contract_address: domain.contract.to_checksum(None),
        chain_id: domain.chain_id,
        project_slug: state.ownership_payload.project_slug.clone(),
        network: state.ownership_payload.network.clone(),
        token_id: domain.token_id.clone(),
        domain_separator: crypto::to_hex(domain.separator.as_slice()),
    })
}
