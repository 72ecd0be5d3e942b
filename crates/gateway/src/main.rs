//! # BlockLander Gateway
//!
//! Ethereumバリデータ運用者向けNFTのミント資格確認サーバー。
//!
//! ## 役割
//! - ウォレット所有権証明の検証
//! - 出金先アドレスからのバリデータ検索とブロック提案履歴の確認
//! - 資格のあるアドレスへのミント認可署名の発行
//!
//! ## API エンドポイント
//! - `GET /api/verify?address=..&userSignature=..` — 資格確認 + 認可署名
//! - `GET /.well-known/blocklander-info` — 認可者情報公開
//!
//! 状態を持たないため、同一設定のインスタンスを任意の数だけ並べられる。

mod authority;
mod config;
mod endpoints;
mod error;
mod oracle;
mod ownership;

use std::sync::Arc;

use config::{GatewayConfig, GatewayState};
use endpoints::{handle_authority_info, handle_verify};

/// ルーティングを構築する。
pub(crate) fn router(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/api/verify", axum::routing::get(handle_verify))
        .route(
            "/.well-known/blocklander-info",
            axum::routing::get(handle_authority_info),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// エントリポイント
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    let state = Arc::new(GatewayState::from_config(&config)?);

    tracing::info!(
        signer = %state.authority.address().to_checksum(None),
        contract = %state.domain.contract.to_checksum(None),
        chain_id = state.domain.chain_id,
        selection = ?state.oracle.selection(),
        "ミント認可者を初期化しました"
    );

    let app = router(state);

    tracing::info!("Gatewayを {} で起動します", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
