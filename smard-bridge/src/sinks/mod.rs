pub mod mqtt;
pub mod snapshot;

pub use mqtt::{ConnectError, MqttPublisher};
pub use snapshot::{publish_category, timestamp_topic, value_topic, PublishError, TopicFailure};
