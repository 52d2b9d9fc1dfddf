use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend responded with status {0}")]
    Status(StatusCode),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),

    #[error("could not encode or decode stored value: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PoolError {
    #[error("at least one storage backend is required")]
    Empty,
}
