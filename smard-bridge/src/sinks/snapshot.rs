use smard_client::Category;

use crate::{
    pipeline::{BusError, Publisher},
    transform::Snapshot,
};

/// `<namespace>/<category>/<column>`
pub fn value_topic(namespace: &str, category: Category, column: &str) -> String {
    format!("{namespace}/{category}/{column}")
}

/// `<namespace>/<category>/<column>/timestamp`
pub fn timestamp_topic(namespace: &str, category: Category, column: &str) -> String {
    format!("{}/timestamp", value_topic(namespace, category, column))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFailure {
    pub topic: String,
    pub error: BusError,
}

#[derive(thiserror::Error, Debug)]
#[error("{} of {attempted} publishes failed for {category}", .failures.len())]
pub struct PublishError {
    pub category: Category,
    pub attempted: usize,
    pub published: usize,
    pub failures: Vec<TopicFailure>,
}

/// Publish a retained value and timestamp message for every column of `snapshot`.
///
/// A failed publish does not stop the remaining columns; all failures are
/// collected into one [`PublishError`] after every message has been tried.
pub async fn publish_category<K>(
    publisher: &K,
    namespace: &str,
    category: Category,
    snapshot: &Snapshot,
) -> Result<usize, PublishError>
where
    K: Publisher + ?Sized,
{
    let mut attempted = 0;
    let mut failures = Vec::new();

    for (column, obs) in snapshot.iter() {
        let messages = [
            (value_topic(namespace, category, column), obs.power.to_string()),
            (
                timestamp_topic(namespace, category, column),
                obs.observed_at_millis().to_string(),
            ),
        ];

        for (topic, payload) in messages {
            attempted += 1;
            if let Err(error) = publisher.publish(&topic, payload, true).await {
                tracing::warn!(%topic, %error, "publish failed");
                failures.push(TopicFailure { topic, error });
            }
        }
    }

    let published = attempted - failures.len();
    metrics::counter!("smard_messages_published_total", "category" => category.name())
        .increment(published as u64);

    if failures.is_empty() {
        return Ok(published);
    }

    metrics::counter!("smard_publish_errors_total", "category" => category.name())
        .increment(failures.len() as u64);
    Err(PublishError {
        category,
        attempted,
        published,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingPublisher;
    use crate::transform::reduce;
    use smard_client::Row;
    use time::macros::datetime;

    fn snapshot(columns: &[(&str, i64)]) -> Snapshot {
        let rows = vec![
            Row::from_raw(datetime!(2024-01-01 00:00:00 UTC), columns.iter().copied()),
            Row::from_raw(datetime!(2024-01-01 01:00:00 UTC), columns.iter().copied()),
        ];
        reduce(&rows).unwrap()
    }

    #[test]
    fn topics_follow_namespace_category_column_layout() {
        assert_eq!(
            value_topic("smard", Category::ProductionForecast, "wind_onshore"),
            "smard/production_forecast/wind_onshore"
        );
        assert_eq!(
            timestamp_topic("smard", Category::Consumption, "total"),
            "smard/consumption/total/timestamp"
        );
    }

    #[tokio::test]
    async fn single_column_produces_two_retained_messages() {
        let publisher = RecordingPublisher::default();

        let published = publish_category(&publisher, "smard", Category::Production, &snapshot(&[("hydro", 1500)]))
            .await
            .unwrap();

        assert_eq!(published, 2);
        assert_eq!(
            publisher.messages(),
            vec![
                ("smard/production/hydro".to_string(), "1500".to_string(), true),
                (
                    "smard/production/hydro/timestamp".to_string(),
                    "1704070800000".to_string(),
                    true
                ),
            ]
        );
    }

    #[tokio::test]
    async fn failing_column_does_not_suppress_the_rest() {
        let publisher = RecordingPublisher::default().failing_on("smard/production/lignite");
        let snap = snapshot(&[("biomass", 10), ("lignite", 20), ("nuclear", 30)]);

        let err = publish_category(&publisher, "smard", Category::Production, &snap)
            .await
            .unwrap_err();

        assert_eq!(err.attempted, 6);
        assert_eq!(err.published, 5);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].topic, "smard/production/lignite");
        assert_eq!(publisher.payload("smard/production/biomass"), Some("10".to_string()));
        assert_eq!(publisher.payload("smard/production/nuclear"), Some("30".to_string()));
        assert!(publisher.payload("smard/production/lignite/timestamp").is_some());
    }

    #[tokio::test]
    async fn empty_snapshot_publishes_nothing() {
        let publisher = RecordingPublisher::default();

        let published = publish_category(&publisher, "smard", Category::Consumption, &Snapshot::default())
            .await
            .unwrap();

        assert_eq!(published, 0);
        assert!(publisher.messages().is_empty());
    }
}
