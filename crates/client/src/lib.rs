//! # BlockLander Client
//!
//! ミントフローのクライアント側実装。
//!
//! - [`workflow`] — ウォレット接続から確認済みトランザクションまでの状態機械
//! - [`api`] — `GET /api/verify` クライアント
//! - [`wallet`] — 所有権証明に署名するローカルウォレット
//! - [`mint`] — `mintWithSignature` 呼び出しの構築

pub mod api;
pub mod mint;
pub mod wallet;
pub mod workflow;

pub use api::{VerifyClient, VerifyOutcome};
pub use mint::MintAuthorization;
pub use wallet::LocalWallet;
pub use workflow::{Action, FlowError, FlowEvent, FlowState, MintFlow};

use blocklander_crypto::CryptoError;
use blocklander_types::ErrorCode;

/// クライアントのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// 接続失敗・タイムアウト等の通信エラー
    #[error("HTTP送信失敗: {0}")]
    Transport(String),
    /// サーバーが型付きエラーを返した
    #[error("サーバーがエラーを返しました（HTTP {status}, {code:?}）: {message}")]
    Rejected {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    /// レスポンスの形式が想定と異なる
    #[error("不正なレスポンス: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Transport(format!("タイムアウト: {}", e.without_url()))
        } else {
            ClientError::Transport(e.without_url().to_string())
        }
    }
}
