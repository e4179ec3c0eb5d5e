use std::time::{Duration, Instant};

use smard_client::{Category, Row};
use time::OffsetDateTime;

use crate::{
    sinks::{publish_category, PublishError},
    transform::{reduce, ReduceError},
};

#[derive(thiserror::Error, Debug)]
#[error("fetch failed for {category}: {reason}")]
pub struct FetchError {
    pub category: Category,
    pub reason: String,
}

/// Failure of a single publish on the bus.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BusError(pub String);

#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Reduce(#[from] ReduceError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[async_trait::async_trait]
pub trait DataProvider: Send + Sync {
    /// Rows of `category` within `[start, end]`, ascending by timestamp.
    async fn fetch(
        &self,
        category: Category,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Row>, FetchError>;
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), BusError>;
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub published: usize,
    pub failed: Vec<(Category, CycleError)>,
}

pub struct Pipeline<P, K> {
    pub provider: P,
    pub publisher: K,
    pub namespace: String,
    pub categories: Vec<Category>,
    pub window: Duration,
    pub interval: Duration,
}

impl<P, K> Pipeline<P, K>
where
    P: DataProvider,
    K: Publisher,
{
    /// Fetch the trailing window ending at `now`, reduce it and publish the
    /// snapshot. Returns the number of messages published.
    pub async fn run_category(&self, category: Category, now: OffsetDateTime) -> Result<usize, CycleError> {
        let start = now - self.window;
        tracing::info!(%category, "fetching data");

        let fetch_started = Instant::now();
        let rows = self.provider.fetch(category, start, now).await?;
        metrics::histogram!("smard_fetch_duration_seconds", "category" => category.name())
            .record(fetch_started.elapsed().as_secs_f64());

        let snapshot = reduce(&rows)?;

        tracing::info!(
            %category,
            rows = rows.len(),
            columns = snapshot.len(),
            "publishing snapshot"
        );
        let published = publish_category(&self.publisher, &self.namespace, category, &snapshot).await?;
        Ok(published)
    }

    /// Process every configured category in order. A failing category is
    /// logged and recorded; it never stops the ones after it.
    pub async fn run_cycle(&self) -> CycleReport {
        metrics::counter!("smard_cycles_total").increment(1);
        let mut report = CycleReport::default();

        for &category in &self.categories {
            match self.run_category(category, OffsetDateTime::now_utc()).await {
                Ok(published) => report.published += published,
                Err(e) => {
                    tracing::error!(%category, error = %e, "category cycle failed, retrying next cycle");
                    metrics::counter!("smard_category_failures_total", "category" => category.name())
                        .increment(1);
                    report.failed.push((category, e));
                }
            }
        }

        report
    }

    pub async fn run(self) {
        loop {
            let report = self.run_cycle().await;
            tracing::info!(
                published = report.published,
                failed = report.failed.len(),
                sleep_secs = self.interval.as_secs(),
                "cycle complete"
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}
