use crate::ApiError;
use anyhow::Result;
use reqwest::{Response, StatusCode};
use tracing::warn;

/// Check the response status.
/// Returns Ok(Response) if successful, or a classified `ApiError` if not.
pub async fn check_response_error(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let response_text = response
        .text()
        .await
        .map_err(|e| ApiError::NetworkError(e.to_string()))?;

    warn!("Streaming request failed with status {}", status);

    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit(response_text),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApiError::Authentication(response_text)
        }
        StatusCode::BAD_REQUEST => ApiError::InvalidRequest(response_text),
        status if status.is_server_error() => ApiError::ServiceError(response_text),
        _ => ApiError::Unknown(format!("Status {status}: {response_text}")),
    };

    Err(error.into())
}
