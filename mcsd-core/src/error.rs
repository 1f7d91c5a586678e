use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid source base URL '{0}': must be an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("invalid source URL '{0}'")]
    InvalidSourceUrl(String),

    #[error("tree error: {0}")]
    Tree(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
