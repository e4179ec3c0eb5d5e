pub mod smard_http;

pub use smard_http::SmardHttpSource;
