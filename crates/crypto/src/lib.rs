//! # BlockLander 暗号処理
//!
//! ミント認可署名と所有権証明の検証に必要なEthereum互換の暗号処理を実装する。
//! コントラクト側の `ecrecover` と同一のダイジェストを計算することが唯一の要件であり、
//! 独自の暗号プリミティブは持たない。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | ハッシュ | Keccak-256 |
//! | メッセージ署名 | EIP-191 personal_sign |
//! | 署名 | secp256k1 ECDSA（RFC 6979 決定的nonce） |
//! | エンコード | Solidity ABI (`abi.encode`) |

use alloy_sol_types::SolValue;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1};

pub use alloy_primitives::{Address, B256, U256};
pub use secp256k1::SecretKey;

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// hex文字列のデコードに失敗
    #[error("hexのデコードに失敗しました: {0}")]
    InvalidHex(String),
    /// 秘密鍵が不正（長さ・範囲外）
    #[error("秘密鍵が不正です")]
    InvalidKey,
    /// 署名の形式が不正
    #[error("署名の形式が不正です: {0}")]
    InvalidSignature(String),
    /// 公開鍵の復元に失敗
    #[error("署名から公開鍵を復元できませんでした")]
    RecoveryFailed,
}

/// EIP-191 personal_sign のプレフィックス
const EIP191_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// 復元可能なsecp256k1署名 `(r, s, v)`。
///
/// `v` はEthereum慣例の 27 / 28。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

impl EcdsaSignature {
    /// 復元ID（0 または 1）を返す。
    pub fn recovery_param(&self) -> u8 {
        self.v.saturating_sub(27)
    }

    /// `r || s || v` の65バイト表現。
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// 65バイトの署名をパースする。`v` は 27/28 と 0/1 の両方を受け付ける。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature(format!(
                "65バイトである必要があります（実際: {}バイト）",
                bytes.len()
            )));
        }
        let v = match bytes[64] {
            0 | 1 => bytes[64] + 27,
            27 | 28 => bytes[64],
            other => {
                return Err(CryptoError::InvalidSignature(format!("不正なv値: {other}")));
            }
        };
        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v,
        })
    }

    /// 0x付きhex文字列から署名をパースする。
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_hex(s)?)
    }

    /// EIP-2098の `yParityAndS`（sの最上位ビットに復元IDを格納）。
    pub fn y_parity_and_s(&self) -> B256 {
        let mut vs = self.s;
        if self.recovery_param() == 1 {
            vs.0[0] |= 0x80;
        }
        vs
    }

    /// EIP-2098コンパクト形式 `r || yParityAndS`（64バイト）。
    pub fn compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..].copy_from_slice(self.y_parity_and_s().as_slice());
        out
    }

    fn to_recoverable(self) -> Result<RecoverableSignature, CryptoError> {
        let recid = RecoveryId::from_i32(i32::from(self.recovery_param()))
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let bytes = self.to_bytes();
        RecoverableSignature::from_compact(&bytes[..64], recid)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

/// `0x` プレフィックスを許容してhexをデコードする。
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CryptoError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| CryptoError::InvalidHex(e.to_string()))
}

/// 0x付きhex文字列に変換する。
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Keccak-256ハッシュ。
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    alloy_primitives::keccak256(data)
}

/// EIP-191 personal_sign ダイジェスト。
///
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`
pub fn eip191_hash(message: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(EIP191_PREFIX.len() + 20 + message.len());
    buf.extend_from_slice(EIP191_PREFIX.as_bytes());
    buf.extend_from_slice(message.len().to_string().as_bytes());
    buf.extend_from_slice(message);
    keccak256(buf)
}

/// hex文字列から秘密鍵をパースする。
///
/// エラーメッセージに鍵素材を含めない。
pub fn parse_secret_key(s: &str) -> Result<SecretKey, CryptoError> {
    let bytes = decode_hex(s.trim()).map_err(|_| CryptoError::InvalidKey)?;
    SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidKey)
}

/// 公開鍵からEthereumアドレスを導出する（Keccak-256の下位20バイト）。
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash.as_slice()[12..])
}

/// 秘密鍵に対応するEthereumアドレス。
pub fn address_of(secret_key: &SecretKey) -> Address {
    let secp = Secp256k1::new();
    address_from_public_key(&PublicKey::from_secret_key(&secp, secret_key))
}

/// 32バイトダイジェストに直接署名する。
pub fn sign_digest(secret_key: &SecretKey, digest: &B256) -> EcdsaSignature {
    let secp = Secp256k1::new();
    let message = Message::from_digest(digest.0);
    let (recid, bytes) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();
    // libsecp256k1 の復元IDは常に 0..=3 だが、low-s署名では 0 / 1 のみ
    let recovery_param = u8::try_from(recid.to_i32()).unwrap_or(0) & 1;
    EcdsaSignature {
        r: B256::from_slice(&bytes[..32]),
        s: B256::from_slice(&bytes[32..]),
        v: 27 + recovery_param,
    }
}

/// EIP-191 personal_sign による署名。ウォレットの `signMessage` と等価。
pub fn sign_message(secret_key: &SecretKey, message: &[u8]) -> EcdsaSignature {
    sign_digest(secret_key, &eip191_hash(message))
}

/// ダイジェストと署名から署名者アドレスを復元する（`ecrecover` 相当）。
pub fn recover_digest(digest: &B256, signature: &EcdsaSignature) -> Result<Address, CryptoError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest(digest.0);
    let public_key = secp
        .recover_ecdsa(&message, &signature.to_recoverable()?)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_from_public_key(&public_key))
}

/// personal_sign 署名から署名者アドレスを復元する。
pub fn recover_message(message: &[u8], signature: &EcdsaSignature) -> Result<Address, CryptoError> {
    recover_digest(&eip191_hash(message), signature)
}

/// ドメインセパレータを計算する。
///
/// `keccak256(abi.encode(keccak256(name), keccak256(tokenId), chainId, contract))`
///
/// ERC-1155のようにtokenIdごとにミント条件が異なる場合を想定してtokenIdを含める。
/// 単一トークンのコントラクトでは常に `"1"`。
pub fn domain_separator(name: &str, token_id: &str, chain_id: u64, contract: Address) -> B256 {
    let encoded = (
        keccak256(name.as_bytes()),
        keccak256(token_id.as_bytes()),
        U256::from(chain_id),
        contract,
    )
        .abi_encode();
    keccak256(encoded)
}

/// ミント認可の署名対象（EIP-191プレフィックス前）。
///
/// `keccak256(abi.encode(domainSeparator, minter, validatorIndex))`
pub fn mint_payload_hash(domain_separator: &B256, minter: Address, validator_index: u64) -> B256 {
    let encoded = (*domain_separator, minter, U256::from(validator_index)).abi_encode();
    keccak256(encoded)
}

/// コントラクトが `ecrecover` に渡すダイジェスト。
///
/// 署名者は32バイトのペイロードハッシュを personal_sign する。
pub fn mint_digest(domain_separator: &B256, minter: Address, validator_index: u64) -> B256 {
    let payload = mint_payload_hash(domain_separator, minter, validator_index);
    eip191_hash(payload.as_slice())
}

/// 定数時間のバイト列比較。
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
