use anyhow::Result;
use smard_bridge::{
    config::AppConfig,
    metrics_server,
    observability,
    pipeline::Pipeline,
    sinks::{mqtt, MqttPublisher},
    sources::SmardHttpSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let broker = cfg.broker()?;
    let client_id = mqtt::client_id(&cfg.mqtt.client_id_prefix);

    // The bus connection is the only startup dependency that is fatal.
    let publisher = match MqttPublisher::connect(&broker, &client_id).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "could not connect to MQTT broker");
            return Err(e.into());
        }
    };

    let provider = SmardHttpSource::from_config(&cfg.smard)?;

    let pipeline = Pipeline {
        provider,
        publisher,
        namespace: cfg.mqtt.topic_namespace.clone(),
        categories: cfg.schedule.categories.clone(),
        window: cfg.schedule.window(),
        interval: cfg.schedule.interval(),
    };

    tracing::info!(
        categories = ?pipeline.categories,
        interval_secs = pipeline.interval.as_secs(),
        "starting polling loop"
    );
    pipeline.run().await;

    Ok(())
}
