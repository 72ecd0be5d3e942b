//! # Verify APIクライアント
//!
//! `GET /api/verify` を呼び出し、結果を状態機械が扱う [`VerifyOutcome`] に分類する。
//!
//! | レスポンス | 分類 |
//! |-----------|------|
//! | 200 + signature | `Eligible` |
//! | 200 + `signature: null` | `Ineligible` |
//! | 400 / 401（アドレス・証明の不備） | `Rejected` |
//! | 502 `lookup_failed`、その他5xx、通信失敗・タイムアウト | `LookupFailed` |

use std::time::Duration;

use blocklander_crypto::{self as crypto, Address};
use blocklander_types::{AuthorityInfo, ErrorBody, ErrorCode, VerifyResponse};
use serde::de::DeserializeOwned;

use crate::mint::MintAuthorization;
use crate::ClientError;

/// verifyリクエストのデフォルトタイムアウト
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// verifyの結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Eligible(MintAuthorization),
    Ineligible,
    /// 時間をおいて再試行できる失敗
    LookupFailed(String),
    /// 入力の不備。署名からやり直す
    Rejected { code: ErrorCode, message: String },
}

/// Gateway APIクライアント。
#[derive(Debug, Clone)]
pub struct VerifyClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl VerifyClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /.well-known/blocklander-info`
    pub async fn authority_info(&self) -> Result<AuthorityInfo, ClientError> {
        self.get_json("/.well-known/blocklander-info", &[]).await
    }

    /// `GET /api/verify` を呼び出し、生のレスポンスを返す。
    pub async fn fetch(
        &self,
        address: Address,
        user_signature: &str,
    ) -> Result<VerifyResponse, ClientError> {
        let address = address.to_checksum(None);
        self.get_json(
            "/api/verify",
            &[("address", address.as_str()), ("userSignature", user_signature)],
        )
        .await
    }

    /// 資格確認を行い、結果を分類する。
    pub async fn verify(&self, address: Address, user_signature: &str) -> VerifyOutcome {
        let outcome = classify(self.fetch(address, user_signature).await);
        match &outcome {
            VerifyOutcome::Eligible(auth) => {
                tracing::info!(%address, validator_index = auth.validator_index, "ミント認可を受信")
            }
            VerifyOutcome::Ineligible => tracing::info!(%address, "資格なし"),
            VerifyOutcome::LookupFailed(reason) => {
                tracing::warn!(%address, %reason, "資格確認に失敗（再試行可能）")
            }
            VerifyOutcome::Rejected { code, .. } => {
                tracing::warn!(%address, ?code, "リクエストが拒否されました")
            }
        }
        outcome
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http_client.get(&url).query(query).send().await?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                ClientError::InvalidResponse(format!("{path}: {}", e.without_url()))
            });
        }

        let bytes = response.bytes().await?;
        match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => Err(ClientError::Rejected {
                status: status.as_u16(),
                code: body.error,
                message: body.message,
            }),
            Err(_) => Err(ClientError::InvalidResponse(format!(
                "{path} が HTTP {status} を返しました"
            ))),
        }
    }
}

fn classify(result: Result<VerifyResponse, ClientError>) -> VerifyOutcome {
    let error = match result {
        Ok(response) => {
            return match MintAuthorization::from_response(&response) {
                Ok(Some(auth)) => VerifyOutcome::Eligible(auth),
                Ok(None) => VerifyOutcome::Ineligible,
                Err(e) => VerifyOutcome::LookupFailed(e.to_string()),
            };
        }
        Err(e) => e,
    };

    match error {
        ClientError::Rejected { code, message, .. }
            if matches!(
                code,
                ErrorCode::InvalidRequest
                    | ErrorCode::InvalidAddress
                    | ErrorCode::OwnershipProofInvalid
            ) =>
        {
            VerifyOutcome::Rejected { code, message }
        }
        other => VerifyOutcome::LookupFailed(other.to_string()),
    }
}

/// 認可者情報のドメインセパレータをパースする。
pub fn domain_separator_of(info: &AuthorityInfo) -> Result<crypto::B256, ClientError> {
    let bytes = crypto::decode_hex(&info.domain_separator)?;
    if bytes.len() != 32 {
        return Err(ClientError::InvalidResponse(
            "domainSeparatorは32バイトである必要があります".to_string(),
        ));
    }
    Ok(crypto::B256::from_slice(&bytes))
}
