/// Errors from a single data source request.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The source returned a non-2xx status code.
    #[error("{source_name} API error ({status}): {body}")]
    Api {
        source_name: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid request URL: {0}")]
    Url(String),
}

/// Return the response unchanged on a 2xx status, or an [`SourceError::Api`]
/// carrying the status and body text.
pub(crate) async fn ensure_success(
    source_name: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(SourceError::Api {
        source_name,
        status: status.as_u16(),
        body,
    })
}
