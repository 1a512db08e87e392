//! HTTP clients for the services the backend depends on.

pub mod catedra;
pub mod proxy;

pub use catedra::CatedraClient;
pub use proxy::ProxySeatFeed;

use evento_core::catedra::GatewayError;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Longest error body kept in a [`GatewayError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Maps a transport failure.
fn unavailable(error: &reqwest::Error) -> GatewayError {
    GatewayError::Unavailable(error.to_string())
}

/// Decodes a 2xx body, or classifies the failure status.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()));
    }
    Err(status_error(status, response).await)
}

async fn status_error(status: StatusCode, response: Response) -> GatewayError {
    let mut body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return GatewayError::Unavailable(format!("{status}: {body}"));
    }
    if status == StatusCode::UNAUTHORIZED {
        return GatewayError::Unauthorized;
    }
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    GatewayError::Status {
        status: status.as_u16(),
        body,
    }
}
