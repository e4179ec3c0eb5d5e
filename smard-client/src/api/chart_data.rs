use std::{collections::BTreeMap, fmt, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use super::{ApiError, ApiResult};
use crate::domain::{Category, Row};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Quarterhour,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Quarterhour => "quarterhour",
            Resolution::Hour => "hour",
            Resolution::Day => "day",
            Resolution::Week => "week",
            Resolution::Month => "month",
            Resolution::Year => "year",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct IndexResponse {
    timestamps: Vec<i64>,
}

#[derive(Deserialize)]
struct SeriesResponse {
    series: Vec<(i64, Option<f64>)>,
}

/// Client for the SMARD chart-data endpoints.
///
/// Every series ("filter") is published as a set of chunks; the index lists
/// the epoch-millisecond start of each chunk.
#[derive(Clone)]
pub struct SmardClient {
    base_url: String,
    region: String,
    resolution: Resolution,
    client: Client,
}

impl SmardClient {
    pub fn new(
        base_url: impl Into<String>,
        region: impl Into<String>,
        resolution: Resolution,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            region: region.into(),
            resolution,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> ApiResult<T> {
        debug!(%url, "requesting chart data");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Start timestamps (epoch ms) of all chunks available for `filter`.
    pub async fn timestamps(&self, filter: u32) -> ApiResult<Vec<i64>> {
        let url = format!(
            "{}/app/chart_data/{filter}/{}/index_{}.json",
            self.base_url, self.region, self.resolution
        );
        let index: IndexResponse = self.get_json(url).await?;
        Ok(index.timestamps)
    }

    /// Raw `(epoch ms, value)` points of one chunk.
    pub async fn series(&self, filter: u32, chunk: i64) -> ApiResult<Vec<(i64, Option<f64>)>> {
        let url = format!(
            "{base}/app/chart_data/{filter}/{region}/{filter}_{region}_{resolution}_{chunk}.json",
            base = self.base_url,
            region = self.region,
            resolution = self.resolution,
        );
        let series: SeriesResponse = self.get_json(url).await?;
        Ok(series.series)
    }

    /// Fetch every column of `category` within `[start, end]` and merge them
    /// into rows sorted by ascending timestamp.
    ///
    /// Provider values are decimal and are truncated to integers. A column
    /// without a point at some row's timestamp reads as missing in that row.
    pub async fn fetch_rows(
        &self,
        category: Category,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ApiResult<Vec<Row>> {
        let start_ms = to_millis(start);
        let end_ms = to_millis(end);
        let mut merged: BTreeMap<i64, BTreeMap<String, Option<i64>>> = BTreeMap::new();

        for column in category.columns() {
            let index = self.timestamps(column.filter).await?;
            for chunk in chunks_covering(&index, start_ms, end_ms) {
                for (ts, value) in self.series(column.filter, chunk).await? {
                    if ts < start_ms || ts > end_ms {
                        continue;
                    }
                    merged
                        .entry(ts)
                        .or_default()
                        .insert(column.name.to_string(), value.map(|v| v as i64));
                }
            }
        }

        merged
            .into_iter()
            .map(|(ts, mut readings)| -> ApiResult<Row> {
                for column in category.columns() {
                    readings.entry(column.name.to_string()).or_insert(None);
                }
                Ok(Row {
                    ts: from_millis(ts)?,
                    readings,
                })
            })
            .collect()
    }
}

/// Chunks whose data may overlap `[start_ms, end_ms]`: the last chunk that
/// starts at or before the window plus every chunk starting inside it.
pub fn chunks_covering(index: &[i64], start_ms: i64, end_ms: i64) -> Vec<i64> {
    let mut sorted = index.to_vec();
    sorted.sort_unstable();

    let first = sorted.iter().rposition(|&ts| ts <= start_ms).unwrap_or(0);
    sorted[first..]
        .iter()
        .copied()
        .filter(|&ts| ts <= end_ms)
        .collect()
}

fn to_millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(ms: i64) -> ApiResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .map_err(|_| ApiError::Timestamp(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Server, ServerGuard};
    use serde_json::json;
    use time::macros::datetime;

    const WEEK_2023_12_25: i64 = 1_703_462_400_000;
    const WEEK_2024_01_01: i64 = 1_704_067_200_000;
    const WEEK_2024_01_08: i64 = 1_704_672_000_000;
    const QUARTER: i64 = 900_000;

    fn at(quarters: i64) -> i64 {
        WEEK_2024_01_01 + quarters * QUARTER
    }

    async fn mock_filter(server: &mut ServerGuard, filter: u32, series: serde_json::Value) {
        server
            .mock("GET", format!("/app/chart_data/{filter}/DE/index_quarterhour.json").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "timestamps": [WEEK_2023_12_25, WEEK_2024_01_01, WEEK_2024_01_08] })
                    .to_string(),
            )
            .create_async()
            .await;

        server
            .mock(
                "GET",
                format!("/app/chart_data/{filter}/DE/{filter}_DE_quarterhour_{WEEK_2024_01_01}.json")
                    .as_str(),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "meta_data": { "version": 1 }, "series": series }).to_string())
            .create_async()
            .await;
    }

    #[test]
    fn chunk_selection_starts_at_last_chunk_before_window() {
        let index = [WEEK_2024_01_08, WEEK_2023_12_25, WEEK_2024_01_01];

        assert_eq!(chunks_covering(&index, at(4), at(8)), vec![WEEK_2024_01_01]);
        assert_eq!(
            chunks_covering(&index, at(4), WEEK_2024_01_08 + QUARTER),
            vec![WEEK_2024_01_01, WEEK_2024_01_08]
        );
        assert_eq!(
            chunks_covering(&index, WEEK_2023_12_25, WEEK_2023_12_25),
            vec![WEEK_2023_12_25]
        );
    }

    #[test]
    fn chunk_selection_handles_window_before_first_chunk_and_empty_index() {
        let index = [WEEK_2024_01_01, WEEK_2024_01_08];

        assert_eq!(chunks_covering(&index, 0, at(1)), vec![WEEK_2024_01_01]);
        assert!(chunks_covering(&index, 0, 10).is_empty());
        assert!(chunks_covering(&[], at(0), at(4)).is_empty());
    }

    #[tokio::test]
    async fn fetch_rows_merges_columns_within_window() {
        let mut server = Server::new_async().await;
        mock_filter(
            &mut server,
            410,
            json!([
                [at(3), 14000.5],
                [at(4), 14100.0],
                [at(5), 14200.0],
                [at(6), 14300.0],
                [at(7), 14400.0],
                [at(8), 14500.0],
                [at(9), null]
            ]),
        )
        .await;
        mock_filter(
            &mut server,
            4359,
            json!([[at(4), 9000.9], [at(5), 9100.0], [at(6), 9200.0], [at(7), null], [at(8), 9400.0]]),
        )
        .await;
        mock_filter(&mut server, 4387, json!([[at(4), 50.0]])).await;

        let client = SmardClient::new(server.url(), "DE", Resolution::Quarterhour).unwrap();
        let rows = client
            .fetch_rows(
                Category::Consumption,
                datetime!(2024-01-01 01:00:00 UTC),
                datetime!(2024-01-01 02:00:00 UTC),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].ts, datetime!(2024-01-01 01:00:00 UTC));
        assert_eq!(rows[4].ts, datetime!(2024-01-01 02:00:00 UTC));
        assert!(rows.windows(2).all(|w| w[0].ts < w[1].ts));

        assert_eq!(rows[0].reading("total"), Some(14100));
        assert_eq!(rows[0].reading("residual_load"), Some(9000));
        assert_eq!(rows[0].reading("pumped_storage"), Some(50));
        assert_eq!(rows[3].reading("residual_load"), None);
        assert_eq!(rows[4].reading("pumped_storage"), None);
        assert!(rows.iter().all(|r| r.readings.len() == 3));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/app/chart_data/122/DE/index_hour.json")
            .with_status(503)
            .create_async()
            .await;

        let client = SmardClient::new(server.url(), "DE", Resolution::Hour).unwrap();
        let err = client.timestamps(122).await.unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        mock.assert_async().await;
    }
}
