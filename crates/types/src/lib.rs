//! # BlockLander 共有型定義
//!
//! Gateway・クライアント・CLIの間でやり取りされるデータ構造と、
//! 外部チェーンデータAPI（beaconcha.in）のレスポンス形式を定義する。
//!
//! ## エンコーディング規則
//! - アドレス: `0x` + 40桁hex（レスポンスではEIP-55チェックサム形式）
//! - 32バイト値・署名: `0x` プレフィックス付きhex
//! - JSONキー: camelCase（Webクライアントとの互換性のため）

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 所有権証明メッセージ
// ---------------------------------------------------------------------------

/// ウォレットが所有権証明として署名するメッセージ。
///
/// `serde_json::to_string` の出力がそのまま署名対象になるため、
/// フィールドの順序を変えてはならない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipPayload {
    /// ネットワーク名（例: "base"）
    pub network: String,
    /// プロジェクト識別子（例: "blockLander"）
    pub project_slug: String,
}

impl OwnershipPayload {
    pub fn new(network: impl Into<String>, project_slug: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            project_slug: project_slug.into(),
        }
    }

    /// 署名対象となる正規JSON文字列を返す。
    ///
    /// 例: `{"network":"base","projectSlug":"blockLander"}`
    pub fn canonical_message(&self) -> String {
        // 2つのStringフィールドのみのため失敗しない
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// /api/verify
// ---------------------------------------------------------------------------

/// `GET /api/verify` のクエリパラメータ。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    /// 請求者のウォレットアドレス
    pub address: String,
    /// 所有権証明メッセージへのEIP-191署名（65バイトhex）
    pub user_signature: String,
}

/// ミント認可署名のワイヤ形式。
///
/// `r`, `s`, `v` が `mintWithSignature` にそのまま渡される。
/// 残りのフィールドは同じ署名の別表現（EIP-2098コンパクト形式等）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintSignature {
    /// 0x付き32バイトhex
    pub r: String,
    /// 0x付き32バイトhex
    pub s: String,
    /// 27 または 28
    pub v: u8,
    /// 0 または 1
    pub recovery_param: u8,
    /// EIP-2098形式のs（最上位ビットにyParity）
    #[serde(rename = "_vs")]
    pub vs: String,
    /// `_vs` と同値
    pub y_parity_and_s: String,
    /// `r || yParityAndS`（64バイトhex）
    pub compact: String,
}

/// `GET /api/verify` のレスポンス。
///
/// - 資格あり: `validatorIndex` と `signature` を含む
/// - 資格なし: `validatorIndex` は省略され、`signature` は `null`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// EIP-55チェックサム形式のアドレス
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_index: Option<u64>,
    pub signature: Option<MintSignature>,
}

/// エラーレスポンスの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// クエリパラメータの欠落・不正
    InvalidRequest,
    /// アドレス形式が不正
    InvalidAddress,
    /// 所有権証明の署名者がアドレスと一致しない
    OwnershipProofInvalid,
    /// チェーンデータAPIの呼び出しに失敗（再試行可能）
    LookupFailed,
    /// 認可署名の生成に失敗
    SigningError,
    /// その他の内部エラー
    Internal,
}

impl ErrorCode {
    /// 時間をおいて再試行すれば成功しうるエラーかどうか。
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::LookupFailed)
    }
}

/// エラーレスポンスボディ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// 認可者情報
// ---------------------------------------------------------------------------

/// `GET /.well-known/blocklander-info` レスポンス。
///
/// クライアントが通信先の署名者とドメインを確認するために使用する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityInfo {
    /// 認可署名者のEIP-55アドレス
    pub signer_address: String,
    /// ミントコントラクトのEIP-55アドレス
    pub contract_address: String,
    pub chain_id: u64,
    pub project_slug: String,
    /// 所有権証明メッセージに含めるネットワーク名
    pub network: String,
    pub token_id: String,
    /// 0x付き32バイトhex
    pub domain_separator: String,
}

// ---------------------------------------------------------------------------
// beaconcha.in API (外部)
// ---------------------------------------------------------------------------

/// beaconcha.in APIの共通レスポンスエンベロープ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconchainEnvelope<T> {
    /// 成功時は "OK"。エラー時は "ERROR: ..." 等
    pub status: String,
    /// エラー時は `null` になりうる
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> BeaconchainEnvelope<T> {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// withdrawalCredentials 検索結果の1件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalValidator {
    pub publickey: String,
    pub validatorindex: u64,
}

/// バリデータが提案した実行レイヤーブロック。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducedBlock {
    #[serde(default)]
    pub block_hash: String,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub fee_recipient: Option<String>,
    #[serde(default)]
    pub tx_count: Option<u64>,
    #[serde(default)]
    pub pos_consensus: Option<PosConsensus>,
}

/// ブロックのコンセンサスレイヤー情報。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosConsensus {
    pub execution_block_number: u64,
    pub proposer_index: u64,
    pub slot: u64,
    pub epoch: u64,
    pub finalized: bool,
}
