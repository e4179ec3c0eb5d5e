use anyhow::{bail, Result};
use serde_json::json;
use smard_bridge::{
    config::AppConfig,
    observability,
    pipeline::DataProvider,
    sources::SmardHttpSource,
    transform,
};
use smard_client::Category;
use std::env;
use time::OffsetDateTime;

/// Fetch one category, reduce it and print the snapshot without publishing.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: smard_snapshot <production|production_forecast|consumption>");
    }
    let category: Category = args[1].parse()?;

    let cfg = AppConfig::load()?;
    let source = SmardHttpSource::from_config(&cfg.smard)?;

    let end = OffsetDateTime::now_utc();
    let start = end - cfg.schedule.window();
    let rows = source.fetch(category, start, end).await?;
    let snapshot = transform::reduce(&rows)?;

    let columns: serde_json::Map<String, serde_json::Value> = snapshot
        .iter()
        .map(|(column, obs)| {
            (
                column.clone(),
                json!({ "power": obs.power, "observed_at": obs.observed_at_millis() }),
            )
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "category": category.name(),
            "rows": rows.len(),
            "columns": columns,
        }))?
    );

    Ok(())
}
