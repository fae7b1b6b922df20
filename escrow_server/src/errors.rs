use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use escrow_engine::{gateways::GatewayError, EscrowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The caller could not be identified. The X-User-Id header is missing or empty.")]
    MissingCallerId,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("An upstream service failed. {0}")]
    UpstreamError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::MissingCallerId => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<EscrowError> for ServerError {
    fn from(e: EscrowError) -> Self {
        match e {
            EscrowError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            EscrowError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            EscrowError::InvalidEscrowState { .. } => Self::Conflict(e.to_string()),
            EscrowError::InvalidOrder(_) => Self::InvalidRequestBody(e.to_string()),
            EscrowError::AmountMismatch { .. } => Self::InvalidRequestBody(e.to_string()),
            EscrowError::ProviderMismatch { .. } => Self::InvalidRequestBody(e.to_string()),
            EscrowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            EscrowError::EscrowNotFound(_) => Self::NoRecordFound(e.to_string()),
            EscrowError::NotificationNotFound(_) => Self::NoRecordFound(e.to_string()),
            EscrowError::NotOrderBuyer(_) => Self::InsufficientPermissions(e.to_string()),
            EscrowError::NotOrderSeller(_) => Self::InsufficientPermissions(e.to_string()),
            EscrowError::RefundFailed(..) => Self::UpstreamError(e.to_string()),
            EscrowError::PayoutFailed(..) => Self::UpstreamError(e.to_string()),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidSignature => Self::InvalidSignature,
            _ => Self::InvalidRequestBody(e.to_string()),
        }
    }
}
