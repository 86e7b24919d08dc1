use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::{
    envelope::Envelope,
    messages::{DOG_NOT_FOUND, FOOD_NOT_FOUND, INVALID_ID, INVALID_QUERY, SERVER_ERROR},
    models::ValidationError,
    query::QueryError,
    store::StoreError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Dog,
    Food,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid identifier")]
    InvalidIdentifier,

    #[error("{0:?} not found")]
    NotFound(Resource),

    #[error(transparent)]
    InvalidQuery(#[from] QueryError),

    #[error("{0}")]
    MalformedQuery(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Payload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidIdentifier | AppError::InvalidQuery(_) | AppError::MalformedQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Payload(_) | AppError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AppError> for Envelope {
    fn from(error: AppError) -> Self {
        let status = error.status();

        match error {
            AppError::InvalidIdentifier => Envelope::failure(status, INVALID_ID, None),
            AppError::NotFound(Resource::Dog) => Envelope::failure(status, DOG_NOT_FOUND, None),
            AppError::NotFound(Resource::Food) => Envelope::failure(status, FOOD_NOT_FOUND, None),
            AppError::InvalidQuery(error) => {
                Envelope::failure(status, INVALID_QUERY, Some(error.to_string()))
            }
            AppError::MalformedQuery(error) => Envelope::failure(status, INVALID_QUERY, Some(error)),
            error => {
                warn!("Request failed: {error}");
                Envelope::failure(status, SERVER_ERROR, Some(error.to_string()))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Envelope::from(self).into_response()
    }
}
