use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire envelope for API errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid slot")]
    InvalidSlot,
    #[error("invalid pubkey")]
    InvalidPublicKey,
    #[error("invalid hash")]
    InvalidHash,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("{0}")]
    InvalidJson(String),
    #[error("{0}")]
    Registration(#[from] crate::registrar::RegistrationError),
    #[error("no execution payload for this request")]
    UnknownPayload,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let code = match self {
            Self::UnknownPayload => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (code, Json(ErrorResponse { code: code.as_u16(), message })).into_response()
    }
}
