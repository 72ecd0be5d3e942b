//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 秘密情報は起動時に一度だけ読み込み、各コンポーネントに注入する。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use blocklander_crypto::Address;
use blocklander_types::OwnershipPayload;

use crate::authority::{MintDomain, SignatureAuthority};
use crate::oracle::beaconchain::BeaconchainClient;
use crate::oracle::{EligibilityOracle, ValidatorSelection};

/// beaconcha.in のデフォルトURL
const DEFAULT_BEACONCHAIN_API_URL: &str = "https://beaconcha.in";
const DEFAULT_PROJECT_SLUG: &str = "blockLander";
const DEFAULT_NETWORK: &str = "base";
const DEFAULT_TOKEN_ID: &str = "1";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_BEACONCHAIN_TIMEOUT_SECS: u64 = 10;

/// ログやDebug出力に値を出さない秘密文字列。
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 秘密の値を参照する。呼び出し側はログに出してはならない。
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// ネットワーク名からチェーンIDを解決する。
pub fn chain_id_for_network(network: &str) -> Option<u64> {
    match network {
        "homestead" | "mainnet" => Some(1),
        "sepolia" => Some(11_155_111),
        "base" => Some(8453),
        "base-sepolia" => Some(84_532),
        _ => None,
    }
}

/// Gateway設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 認可署名用secp256k1秘密鍵（VALIDATOR_PRIVATE_KEY）
    pub validator_private_key: Secret,
    /// beaconcha.in APIキー（BEACONCHAIN_API_KEY）
    pub beaconchain_api_key: Secret,
    pub beaconchain_api_url: String,
    /// チェーンデータAPI 1リクエストあたりのタイムアウト
    pub beaconchain_timeout: Duration,
    /// ミントコントラクトのアドレス
    pub contract_address: Address,
    /// ドメインセパレータに含めるチェーンID
    pub chain_id: u64,
    /// ドメインセパレータの `name` と所有権証明の `projectSlug`
    pub project_slug: String,
    /// 所有権証明メッセージの `network`
    pub ownership_network: String,
    pub token_id: String,
    pub validator_selection: ValidatorSelection,
    pub listen_addr: String,
}

impl GatewayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー検索関数から構築する。空文字列は未設定として扱う。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("{key}が設定されていません"));

        let validator_private_key = Secret::new(required("VALIDATOR_PRIVATE_KEY")?);
        let beaconchain_api_key = Secret::new(required("BEACONCHAIN_API_KEY")?);

        let contract_raw = required("MINT_CONTRACT_ADDRESS")?;
        let contract_address = Address::from_str(contract_raw.trim())
            .with_context(|| format!("MINT_CONTRACT_ADDRESSが不正です: {contract_raw}"))?;

        let chain_id = match get("MINT_CHAIN_ID") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("MINT_CHAIN_IDが不正です: {raw}"))?,
            None => {
                let network = get("MINT_NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());
                chain_id_for_network(&network)
                    .ok_or_else(|| anyhow!("未知のMINT_NETWORKです: {network}"))?
            }
        };

        let beaconchain_timeout = match get("BEACONCHAIN_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("BEACONCHAIN_TIMEOUT_SECSが不正です: {raw}"))?,
            ),
            None => Duration::from_secs(DEFAULT_BEACONCHAIN_TIMEOUT_SECS),
        };

        let validator_selection = match get("VALIDATOR_SELECTION") {
            Some(raw) => raw.parse::<ValidatorSelection>()?,
            None => ValidatorSelection::default(),
        };

        Ok(Self {
            validator_private_key,
            beaconchain_api_key,
            beaconchain_api_url: get("BEACONCHAIN_API_URL")
                .unwrap_or_else(|| DEFAULT_BEACONCHAIN_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            beaconchain_timeout,
            contract_address,
            chain_id,
            project_slug: get("PROJECT_SLUG").unwrap_or_else(|| DEFAULT_PROJECT_SLUG.to_string()),
            ownership_network: get("OWNERSHIP_NETWORK")
                .unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
            token_id: get("MINT_TOKEN_ID").unwrap_or_else(|| DEFAULT_TOKEN_ID.to_string()),
            validator_selection,
            listen_addr: get("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        })
    }

    /// ミント認可のドメイン。
    pub fn mint_domain(&self) -> MintDomain {
        MintDomain::new(
            &self.project_slug,
            &self.token_id,
            self.chain_id,
            self.contract_address,
        )
    }

    /// クライアントが署名すべき所有権証明メッセージ。
    pub fn ownership_payload(&self) -> OwnershipPayload {
        OwnershipPayload::new(&self.ownership_network, &self.project_slug)
    }
}

/// Gatewayの共有状態。リクエスト間で変更されない。
pub struct GatewayState {
    pub authority: SignatureAuthority,
    pub oracle: EligibilityOracle,
    pub domain: MintDomain,
    pub ownership_payload: OwnershipPayload,
}

impl GatewayState {
    /// 設定から共有状態を構築する。鍵素材が不正ならここで失敗する。
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let authority = SignatureAuthority::from_key_material(&config.validator_private_key)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.beaconchain_timeout)
            .build()
            .context("HTTPクライアントの構築に失敗")?;
        let source = BeaconchainClient::new(
            http_client,
            config.beaconchain_api_url.clone(),
            config.beaconchain_api_key.clone(),
        );

        Ok(Self {
            authority,
            oracle: EligibilityOracle::new(Box::new(source), config.validator_selection),
            domain: config.mint_domain(),
            ownership_payload: config.ownership_payload(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const CONTRACT: &str = "0x1111111111111111111111111111111111111111";

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("VALIDATOR_PRIVATE_KEY", KEY),
            ("BEACONCHAIN_API_KEY", "test-api-key"),
            ("MINT_CONTRACT_ADDRESS", CONTRACT),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&required())).unwrap();
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.project_slug, "blockLander");
        assert_eq!(config.ownership_network, "base");
        assert_eq!(config.token_id, "1");
        assert_eq!(config.beaconchain_api_url, "https://beaconcha.in");
        assert_eq!(config.beaconchain_timeout, Duration::from_secs(10));
        assert_eq!(config.validator_selection, ValidatorSelection::First);
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_missing_required_values() {
        for missing in ["VALIDATOR_PRIVATE_KEY", "BEACONCHAIN_API_KEY", "MINT_CONTRACT_ADDRESS"] {
            let pairs: Vec<_> = required().into_iter().filter(|(k, _)| *k != missing).collect();
            let err = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert!(err.to_string().contains(missing), "{err}");
        }

        // 空文字列は未設定扱い
        let mut pairs = required();
        pairs[1] = ("BEACONCHAIN_API_KEY", "  ");
        assert!(GatewayConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_chain_id_resolution() {
        let mut pairs = required();
        pairs.push(("MINT_NETWORK", "homestead"));
        let config = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.chain_id, 1);

        // 明示的なMINT_CHAIN_IDが優先される
        pairs.push(("MINT_CHAIN_ID", "11155111"));
        let config = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.chain_id, 11_155_111);

        let mut pairs = required();
        pairs.push(("MINT_NETWORK", "unknown-net"));
        assert!(GatewayConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = required();
        pairs.extend([
            ("BEACONCHAIN_API_URL", "http://127.0.0.1:9999/"),
            ("BEACONCHAIN_TIMEOUT_SECS", "3"),
            ("VALIDATOR_SELECTION", "first-proposer"),
            ("PROJECT_SLUG", "otherProject"),
        ]);
        let config = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.beaconchain_api_url, "http://127.0.0.1:9999");
        assert_eq!(config.beaconchain_timeout, Duration::from_secs(3));
        assert_eq!(config.validator_selection, ValidatorSelection::FirstProposer);
        assert_eq!(
            config.ownership_payload().canonical_message(),
            r#"{"network":"base","projectSlug":"otherProject"}"#
        );
    }

    #[test]
    fn test_invalid_contract_address() {
        let mut pairs = required();
        pairs[2] = ("MINT_CONTRACT_ADDRESS", "0x1234");
        assert!(GatewayConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    /// Debug出力に秘密の値が含まれない
    #[test]
    fn test_debug_redacts_secrets() {
        let config = GatewayConfig::from_lookup(lookup_from(&required())).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains(&KEY[2..]));
        assert!(!debug.contains("test-api-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_state_rejects_invalid_key() {
        let mut pairs = required();
        pairs[0] = ("VALIDATOR_PRIVATE_KEY", "0xdeadbeef");
        let config = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();
        let err = GatewayState::from_config(&config).err().unwrap();
        assert!(!err.to_string().contains("deadbeef"));
    }
}
