pub mod api;
pub mod domain;

pub use api::{ApiError, ApiResult, Resolution, SmardClient};
pub use domain::{Category, Column, Row, MISSING_READING};
