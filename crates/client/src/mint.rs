//! # ミントトランザクションの構築
//!
//! `/api/verify` が返した認可署名を、コントラクトの
//! `mintWithSignature(address,uint256,uint8,bytes32,bytes32)` 呼び出しに変換する。

use std::str::FromStr;

use alloy_sol_types::{sol, SolCall};
use blocklander_crypto::{self as crypto, Address, EcdsaSignature, B256, U256};
use blocklander_types::VerifyResponse;

use crate::ClientError;

sol! {
    function mintWithSignature(
        address minter,
        uint256 validatorIndex,
        uint8 v,
        bytes32 r,
        bytes32 s
    ) external;
}

/// クライアント側で保持するミント認可。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintAuthorization {
    pub minter: Address,
    pub validator_index: u64,
    pub signature: EcdsaSignature,
}

impl MintAuthorization {
    /// verifyレスポンスから認可を取り出す。資格なし（`signature: null`）なら `None`。
    pub fn from_response(response: &VerifyResponse) -> Result<Option<Self>, ClientError> {
        let Some(signature) = &response.signature else {
            return Ok(None);
        };
        let validator_index = response.validator_index.ok_or_else(|| {
            ClientError::InvalidResponse("署名があるのにvalidatorIndexがありません".to_string())
        })?;
        let minter = Address::from_str(&response.address)
            .map_err(|e| ClientError::InvalidResponse(format!("address: {e}")))?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend(word(&signature.r, "r")?);
        bytes.extend(word(&signature.s, "s")?);
        bytes.push(signature.v);

        Ok(Some(Self {
            minter,
            validator_index,
            signature: EcdsaSignature::from_bytes(&bytes)?,
        }))
    }

    pub fn call(&self) -> mintWithSignatureCall {
        mintWithSignatureCall {
            minter: self.minter,
            validatorIndex: U256::from(self.validator_index),
            v: self.signature.v,
            r: self.signature.r,
            s: self.signature.s,
        }
    }

    /// セレクタ付きのABIエンコード済みcalldata。
    pub fn calldata(&self) -> Vec<u8> {
        self.call().abi_encode()
    }

    /// 署名者アドレスを復元する。`/.well-known/blocklander-info` の
    /// `signerAddress` と照合すれば、送信前に認可の正当性を確認できる。
    pub fn recover_signer(&self, domain_separator: &B256) -> Result<Address, ClientError> {
        let digest = crypto::mint_digest(domain_separator, self.minter, self.validator_index);
        Ok(crypto::recover_digest(&digest, &self.signature)?)
    }
}

fn word(hex: &str, field: &str) -> Result<Vec<u8>, ClientError> {
    let bytes = crypto::decode_hex(hex)?;
    if bytes.len() != 32 {
        return Err(ClientError::InvalidResponse(format!(
            "{field} は32バイトである必要があります（実際: {}バイト）",
            bytes.len()
        )));
    }
    Ok(bytes)
}
