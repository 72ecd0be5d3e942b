//! # 所有権証明の検証
//!
//! クライアントが主張するアドレスと、正規メッセージへの署名から復元した署名者を照合する。
//! オラクル検索より前に実行し、他人のアドレスでの認可取得を防ぐ。

use blocklander_crypto::{self as crypto, Address, EcdsaSignature};
use blocklander_types::OwnershipPayload;

/// 所有権証明の検証エラー。
#[derive(Debug, thiserror::Error)]
pub enum OwnershipError {
    /// 署名のhex・長さ・v値が不正
    #[error("userSignatureの形式が不正です: {0}")]
    Malformed(String),
    /// 復元した署名者が主張アドレスと一致しない
    #[error("署名者がアドレスと一致しません")]
    SignerMismatch,
}

/// `signature_hex` が `payload` に対する `claimed` の署名であることを確認する。
pub fn verify_ownership_proof(
    payload: &OwnershipPayload,
    claimed: Address,
    signature_hex: &str,
) -> Result<(), OwnershipError> {
    let signature = EcdsaSignature::from_hex(signature_hex.trim())
        .map_err(|e| OwnershipError::Malformed(e.to_string()))?;

    let message = payload.canonical_message();
    let recovered = crypto::recover_message(message.as_bytes(), &signature)
        .map_err(|e| OwnershipError::Malformed(e.to_string()))?;

    if !crypto::constant_time_eq(recovered.as_slice(), claimed.as_slice()) {
        return Err(OwnershipError::SignerMismatch);
    }
    Ok(())
}
