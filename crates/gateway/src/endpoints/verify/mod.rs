//! # GET /api/verify エンドポイント
//!
//! ## 処理フロー
//! 1. アドレスをパース
//! 2. 所有権証明の署名者を復元し、アドレスと照合
//! 3. 資格オラクルでバリデータと提案履歴を検索
//! 4. 提案履歴があれば認可署名を発行
//!
//! ステートレスで副作用を持たない。同一入力の再呼び出しは同じ論理的結果を返す。

mod handler;

pub use handler::handle_verify;
#[cfg(test)]
use handler::verify;

use std::str::FromStr;

use blocklander_crypto::Address;

use crate::error::GatewayError;

/// `0x` + 40桁hexのアドレスをパースする。
///
/// 大文字小文字が混在する場合はEIP-55チェックサムとして検証する。
pub(crate) fn parse_address(raw: &str) -> Result<Address, GatewayError> {
    let trimmed = raw.trim();
    let Some(digits) = trimmed.strip_prefix("0x") else {
        return Err(GatewayError::InvalidAddress(
            "0xプレフィックスが必要です".to_string(),
        ));
    };
    if digits.len() != 40 {
        return Err(GatewayError::InvalidAddress(format!(
            "40桁のhexである必要があります（実際: {}桁）",
            digits.len()
        )));
    }

    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        return Address::parse_checksummed(trimmed, None)
            .map_err(|_| GatewayError::InvalidAddress("チェックサムが一致しません".to_string()));
    }

    Address::from_str(trimmed).map_err(|e| GatewayError::InvalidAddress(e.to_string()))
}
