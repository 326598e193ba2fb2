use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 上游 SIEG 调用错误
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("document {chave} not found upstream")]
    NotFound { chave: String },

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected upstream payload: {0}")]
    Decode(String),

    #[error("invalid upstream configuration: {0}")]
    Config(String),
}

impl UpstreamError {
    /// 是否值得重试 (网络错误、429、5xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_builder() && !e.is_decode(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. } | Self::Decode(_) | Self::Config(_) => false,
        }
    }
}

/// XML 文档无法规范化 (缺失必填字段或格式错误)
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid number in `{field}`: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid date in `{field}`: {value:?}")]
    InvalidDate { field: &'static str, value: String },
}

/// 网关统一错误
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("caller is not a party of this document")]
    Forbidden,

    #[error("document {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Upstream(UpstreamError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound { chave } => Self::NotFound(chave),
            other => Self::Upstream(other),
        }
    }
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) | Self::Normalize(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// 带有接口级通用提示的错误, 500 时不暴露上游细节
#[derive(Debug)]
pub struct ApiError {
    pub source: GatewayError,
    pub generic_message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.source.status_code();
        let message = match &self.source {
            GatewayError::Validation(msg) => msg.clone(),
            GatewayError::Forbidden => "Nota não pertence a este cliente".to_string(),
            GatewayError::NotFound(_) => "Nota não encontrada na SIEG".to_string(),
            other => {
                tracing::error!(error = %other, "{}", self.generic_message);
                self.generic_message.to_string()
            }
        };

        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), error = %self.source, "request rejected");
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// 给 service 层错误附加接口提示
pub trait ResultExt<T> {
    fn or_respond(self, generic_message: &'static str) -> std::result::Result<T, ApiError>;
}

impl<T> ResultExt<T> for Result<T> {
    fn or_respond(self, generic_message: &'static str) -> std::result::Result<T, ApiError> {
        self.map_err(|source| ApiError {
            source,
            generic_message,
        })
    }
}
