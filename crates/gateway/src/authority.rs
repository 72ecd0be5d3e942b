//! # 認可署名者 (Signature Authority)
//!
//! 資格確認済みの (アドレス, validatorIndex) に対してミント認可署名を発行する。
//! 秘密鍵はこのモジュールの外に出さない。
//!
//! 呼び出し側が資格確認を済ませていることを前提とし、ここでは独自の確認を行わない。

use std::fmt;

use blocklander_crypto::{self as crypto, Address, EcdsaSignature, SecretKey, B256};
use blocklander_types::MintSignature;

use crate::config::Secret;

/// 認可署名のエラー型。
///
/// メッセージに鍵素材を含めてはならない。
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// 鍵素材が未設定
    #[error("署名用秘密鍵が設定されていません")]
    MissingKey,
    /// 鍵素材が不正
    #[error("署名用秘密鍵が不正です")]
    InvalidKey,
    /// 生成した署名が自身のアドレスに復元されない
    #[error("生成した署名の自己検証に失敗しました")]
    SelfCheckFailed,
}

/// ミント認可のドメイン。ドメインセパレータは構築時に一度だけ計算する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintDomain {
    pub name: String,
    pub token_id: String,
    pub chain_id: u64,
    pub contract: Address,
    pub separator: B256,
}

impl MintDomain {
    pub fn new(name: &str, token_id: &str, chain_id: u64, contract: Address) -> Self {
        Self {
            name: name.to_string(),
            token_id: token_id.to_string(),
            chain_id,
            contract,
            separator: crypto::domain_separator(name, token_id, chain_id, contract),
        }
    }
}

/// ミント認可。コントラクトの `mintWithSignature` にそのまま渡せる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintAuthorization {
    pub minter: Address,
    pub validator_index: u64,
    pub signature: EcdsaSignature,
}

impl MintAuthorization {
    /// レスポンス用のワイヤ形式に変換する。
    pub fn to_wire(&self) -> MintSignature {
        let sig = &self.signature;
        let vs = crypto::to_hex(sig.y_parity_and_s().as_slice());
        MintSignature {
            r: crypto::to_hex(sig.r.as_slice()),
            s: crypto::to_hex(sig.s.as_slice()),
            v: sig.v,
            recovery_param: sig.recovery_param(),
            vs: vs.clone(),
            y_parity_and_s: vs,
            compact: crypto::to_hex(&sig.compact()),
        }
    }
}

/// 認可署名者。
pub struct SignatureAuthority {
    secret_key: SecretKey,
    address: Address,
}

impl SignatureAuthority {
    /// 設定された鍵素材から構築する。
    pub fn from_key_material(key: &Secret) -> Result<Self, SigningError> {
        let raw = key.expose().trim();
        if raw.is_empty() {
            return Err(SigningError::MissingKey);
        }
        let secret_key = crypto::parse_secret_key(raw).map_err(|_| SigningError::InvalidKey)?;
        Ok(Self::new(secret_key))
    }

    pub fn new(secret_key: SecretKey) -> Self {
        let address = crypto::address_of(&secret_key);
        Self {
            secret_key,
            address,
        }
    }

    /// コントラクトが `ecrecover` で照合する署名者アドレス。
    pub fn address(&self) -> Address {
        self.address
    }

    /// `minter` が `validator_index` に基づいてミントすることを認可する。
    ///
    /// `keccak256(abi.encode(domainSeparator, minter, validatorIndex))` を
    /// personal_sign し、復元結果が自身のアドレスと一致することを確認してから返す。
    pub fn authorize(
        &self,
        minter: Address,
        validator_index: u64,
        domain_separator: &B256,
    ) -> Result<MintAuthorization, SigningError> {
        let digest = crypto::mint_digest(domain_separator, minter, validator_index);
        let signature = crypto::sign_digest(&self.secret_key, &digest);

        let recovered =
            crypto::recover_digest(&digest, &signature).map_err(|_| SigningError::SelfCheckFailed)?;
        if recovered != self.address {
            return Err(SigningError::SelfCheckFailed);
        }

        Ok(MintAuthorization {
            minter,
            validator_index,
            signature,
        })
    }
}

impl fmt::Debug for SignatureAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureAuthority")
            .field("address", &self.address)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn test_domain() -> MintDomain {
        MintDomain::new(
            "blockLander",
            "1",
            8453,
            Address::from_str("0x1111111111111111111111111111111111111111").unwrap(),
        )
    }

    #[test]
    fn test_from_key_material_errors() {
        assert!(matches!(
            SignatureAuthority::from_key_material(&Secret::new("")),
            Err(SigningError::MissingKey)
        ));
        assert!(matches!(
            SignatureAuthority::from_key_material(&Secret::new("0xzz")),
            Err(SigningError::InvalidKey)
        ));
    }

    /// 認可署名はコントラクトと同じダイジェストから認可者アドレスに復元される
    #[test]
    fn test_authorize_recovers_to_authority() {
        let authority = SignatureAuthority::new(SecretKey::new(&mut rand::rngs::OsRng));
        let domain = test_domain();
        let minter = Address::from_str("0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB").unwrap();

        let auth = authority.authorize(minter, 42, &domain.separator).unwrap();
        assert_eq!(auth.minter, minter);
        assert_eq!(auth.validator_index, 42);

        let digest = crypto::mint_digest(&domain.separator, minter, 42);
        assert_eq!(
            crypto::recover_digest(&digest, &auth.signature).unwrap(),
            authority.address()
        );

        // 別のドメインでは認可者に復元されない
        let other = MintDomain::new("blockLander", "1", 1, domain.contract);
        let other_digest = crypto::mint_digest(&other.separator, minter, 42);
        assert_ne!(
            crypto::recover_digest(&other_digest, &auth.signature).unwrap(),
            authority.address()
        );
    }

    #[test]
    fn test_wire_format() {
        let authority = SignatureAuthority::new(SecretKey::new(&mut rand::rngs::OsRng));
        let auth = authority
            .authorize(Address::ZERO, 1, &test_domain().separator)
            .unwrap();
        let wire = auth.to_wire();

        assert_eq!(wire.r.len(), 66);
        assert_eq!(wire.s.len(), 66);
        assert_eq!(wire.compact.len(), 2 + 128);
        assert_eq!(wire.v, 27 + wire.recovery_param);
        assert_eq!(wire.vs, wire.y_parity_and_s);
        assert!(wire.compact.starts_with(&wire.r));
    }

    #[test]
    fn test_domain_separator_stable() {
        assert_eq!(test_domain().separator, test_domain().separator);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let authority = SignatureAuthority::from_key_material(&Secret::new(key)).unwrap();
        let debug = format!("{authority:?}");
        assert!(!debug.contains(&key[2..]));
        assert!(debug.contains("<redacted>"));
    }
}
