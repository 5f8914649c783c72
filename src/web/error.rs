use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use strum_macros::AsRefStr;

use super::routes::SubscribeError;

pub type WebResult<T> = core::result::Result<T, Error>;

#[derive(Debug, AsRefStr, thiserror::Error)]
pub enum Error {
    #[error("subscribe error: {0}")]
    Subscribe(#[from] SubscribeError),

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl Error {
    /// Every error that reaches the client is a fault on our side,
    /// bad input never becomes an `Error`.
    pub fn status_code_and_client_error(&self) -> (StatusCode, ClientError) {
        match self {
            Error::Subscribe(_) | Error::Unexpected(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ClientError::ServiceError)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::debug!("{:<12} - into_response(Error: {self:?})", "INTO_RESP");

        // Construct a response
        let mut res = StatusCode::INTERNAL_SERVER_ERROR.into_response();

        // Insert the Error into response so that it can be retrieved later.
        res.extensions_mut().insert(Arc::new(self));

        res
    }
}

#[derive(Debug, AsRefStr, Serialize, derive_more::Display)]
#[serde(tag = "message", content = "detail")]
pub enum ClientError {
    #[display("Service Error!")]
    #[serde(rename = "Service Error!")]
    ServiceError,
}
