//! # Gateway エラー型
//!
//! 全エンドポイントで共通のエラー型。レスポンスは型付きJSONボディ
//! `{"error": "<code>", "message": "..."}` で返す。

use axum::http::StatusCode;
use axum::Json;
use blocklander_types::{ErrorBody, ErrorCode};

use crate::authority::SigningError;
use crate::oracle::OracleError;
use crate::ownership::OwnershipError;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// クエリパラメータの欠落・パース失敗
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// アドレス形式が不正
    #[error("アドレスが不正です: {0}")]
    InvalidAddress(String),
    /// 所有権証明の検証失敗
    #[error("所有権証明の検証に失敗: {0}")]
    OwnershipProofInvalid(#[from] OwnershipError),
    /// チェーンデータAPIの呼び出し失敗（再試行可能）
    #[error(transparent)]
    LookupFailed(#[from] OracleError),
    /// 認可署名の生成失敗
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) | GatewayError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            GatewayError::OwnershipProofInvalid(_) => StatusCode::UNAUTHORIZED,
            GatewayError::LookupFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::BadRequest(_) => ErrorCode::InvalidRequest,
            GatewayError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            GatewayError::OwnershipProofInvalid(_) => ErrorCode::OwnershipProofInvalid,
            GatewayError::LookupFailed(_) => ErrorCode::LookupFailed,
            GatewayError::Signing(_) => ErrorCode::SigningError,
        }
    }

    /// クライアントに返すメッセージ。サーバー側の詳細は含めない。
    fn public_message(&self) -> String {
        match self {
            GatewayError::LookupFailed(_) => {
                "チェーンデータの取得に失敗しました。時間をおいて再試行してください".to_string()
            }
            GatewayError::Signing(_) => "サーバー内部でエラーが発生しました".to_string(),
            other => other.to_string(),
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "リクエスト処理に失敗");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    async fn body_of(err: GatewayError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_lookup_failed_response() {
        let (status, body) =
            body_of(OracleError::LookupFailed("HTTP 500 Internal Server Error".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error, ErrorCode::LookupFailed);
        assert!(!body.message.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_signing_error_is_generic() {
        let (status, body) = body_of(SigningError::InvalidKey.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, ErrorCode::SigningError);
        assert!(!body.message.contains("秘密鍵"));
    }

    #[tokio::test]
    async fn test_client_errors() {
        let (status, body) = body_of(GatewayError::InvalidAddress("0x12".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, ErrorCode::InvalidAddress);

        let (status, body) = body_of(OwnershipError::SignerMismatch.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, ErrorCode::OwnershipProofInvalid);
    }
}
