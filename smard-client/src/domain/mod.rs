pub mod category;
pub mod row;

pub use category::{Category, Column};
pub use row::{Row, MISSING_READING};
