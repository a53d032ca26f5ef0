use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    // Connect failures, timeouts and broken bodies on one source variant
    #[error("Network request failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to decode response from {0}")]
    Decode(String, #[source] serde_json::Error),

    #[error("API rejected {url}: {message}")]
    ApiMessage { url: String, message: String },

    #[error("Response from {0} contained no records")]
    EmptyPage(String),

    #[error("Response from {0} is neither a data page nor an error message")]
    UnexpectedShape(String),

    #[error("No usable source for indicator '{indicator}' after {attempts} attempts")]
    NoUsableSource { indicator: String, attempts: usize },
}
