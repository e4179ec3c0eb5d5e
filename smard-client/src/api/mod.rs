pub mod chart_data;

pub use chart_data::{chunks_covering, Resolution, SmardClient};

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("timestamp out of range: {0} ms")]
    Timestamp(i64),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type ApiResult<T> = Result<T, ApiError>;
