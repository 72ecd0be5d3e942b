//! # beaconcha.in クライアント
//!
//! `ChainDataSource` の本番実装。
//!
//! ## 使用するエンドポイント
//! - `GET /api/v1/validator/withdrawalCredentials/{address}` — 出金先 → バリデータ
//! - `GET /api/v1/execution/{validatorIndex}/produced` — 提案ブロック履歴
//!
//! APIキーはクエリパラメータで送信する。URLにキーが含まれるため、
//! reqwestのエラーはURLを除去してから扱う。

use blocklander_crypto::{self as crypto, Address};
use blocklander_types::{BeaconchainEnvelope, ProducedBlock, WithdrawalValidator};
use serde::de::DeserializeOwned;

use super::{ChainDataSource, OracleError};
use crate::config::Secret;

/// 1回の検索で取得する最大件数
const PAGE_LIMIT: &str = "10";

/// beaconcha.in REST APIクライアント。
pub struct BeaconchainClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Secret,
}

impl BeaconchainClient {
    /// タイムアウトは `http_client` 側で設定しておくこと。
    pub fn new(http_client: reqwest::Client, base_url: String, api_key: Secret) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
        }
    }

    /// GETリクエストを送り、エンベロープの `data` を取り出す。
    async fn get_data<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, OracleError>
    where
        T: DeserializeOwned + Default,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(query)
            .query(&[("apikey", self.api_key.expose())])
            .send()
            .await
            .map_err(|e| OracleError::LookupFailed(format!("HTTP送信失敗: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::LookupFailed(format!(
                "{path} がエラーを返しました: HTTP {status}"
            )));
        }

        let envelope: BeaconchainEnvelope<T> = response.json().await.map_err(|e| {
            OracleError::LookupFailed(format!("レスポンスのパースに失敗: {}", e.without_url()))
        })?;

        if !envelope.is_ok() {
            return Err(OracleError::LookupFailed(format!(
                "{path} が非OKステータスを返しました: {}",
                envelope.status
            )));
        }

        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ChainDataSource for BeaconchainClient {
    async fn validators_by_withdrawal_address(
        &self,
        address: Address,
    ) -> Result<Vec<WithdrawalValidator>, OracleError> {
        let path = format!(
            "/api/v1/validator/withdrawalCredentials/{}",
            crypto::to_hex(address.as_slice())
        );
        self.get_data(&path, &[("limit", PAGE_LIMIT), ("offset", "0")])
            .await
    }

    async fn produced_blocks(
        &self,
        validator_index: u64,
    ) -> Result<Vec<ProducedBlock>, OracleError> {
        let path = format!("/api/v1/execution/{validator_index}/produced");
        self.get_data(
            &path,
            &[("offset", "0"), ("limit", PAGE_LIMIT), ("sort", "desc")],
        )
        .await
    }
}
