pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;

pub use pipeline::{CycleError, DataProvider, Pipeline, Publisher};
pub use transform::{reduce, Observation, Snapshot};
