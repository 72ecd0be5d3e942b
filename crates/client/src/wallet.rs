//! # ローカルウォレット
//!
//! ブラウザウォレットの `signMessage` 相当。秘密鍵から所有権証明を作る。

use std::fmt;

use blocklander_crypto::{self as crypto, Address, SecretKey};
use blocklander_types::OwnershipPayload;

use crate::ClientError;

pub struct LocalWallet {
    secret_key: SecretKey,
    address: Address,
}

impl LocalWallet {
    pub fn new(secret_key: SecretKey) -> Self {
        let address = crypto::address_of(&secret_key);
        Self {
            secret_key,
            address,
        }
    }

    /// 32バイトhex（`0x` 任意）の秘密鍵から構築する。
    pub fn from_hex(key: &str) -> Result<Self, ClientError> {
        Ok(Self::new(crypto::parse_secret_key(key)?))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// 正規メッセージにpersonal_signし、`userSignature` として送る65バイトhexを返す。
    pub fn sign_ownership(&self, payload: &OwnershipPayload) -> String {
        let message = payload.canonical_message();
        let signature = crypto::sign_message(&self.secret_key, message.as_bytes());
        crypto::to_hex(&signature.to_bytes())
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
