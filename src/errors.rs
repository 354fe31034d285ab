use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::credentials::AuthError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing imageData")]
    MissingPayload,
    #[error("Invalid filename")]
    InvalidIdentifier,
    #[error("Doodle not found")]
    NotFound,
    #[error("Invalid OAuth state")]
    InvalidState,
    #[error("Failed to save doodle")]
    SaveFailed,
    #[error("Failed to delete doodle")]
    DeleteFailed,
    #[error("Error reading doodles.")]
    ListFailed,
    #[error("Failed to load doodle")]
    FetchFailed,
    #[error("Authentication failed")]
    AuthFailed,
    #[error("login required")]
    LoginRequired,
}

impl ApiError {
    /// Maps a store failure onto the client-facing taxonomy; anything that
    /// is not the caller's fault collapses into `fallback`.
    pub fn from_store(e: StoreError, fallback: ApiError) -> Self {
        match e {
            StoreError::InvalidIdentifier(_) => ApiError::InvalidIdentifier,
            StoreError::NotFound(_) => ApiError::NotFound,
            other => {
                log::error!("{fallback}: {other}");
                fallback
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingPayload | ApiError::InvalidIdentifier | ApiError::InvalidState => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::LoginRequired => StatusCode::FOUND,
            ApiError::SaveFailed
            | ApiError::DeleteFailed
            | ApiError::ListFailed
            | ApiError::FetchFailed
            | ApiError::AuthFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::LoginRequired = self {
            return HttpResponse::Found()
                .insert_header((header::LOCATION, "/auth/google"))
                .finish();
        }
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        log::error!("oauth error: {e}");
        ApiError::AuthFailed
    }
}
