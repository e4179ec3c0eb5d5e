use smard_client::{Category, Row, SmardClient};
use time::OffsetDateTime;

use crate::{
    config::SmardConfig,
    pipeline::{DataProvider, FetchError},
};

/// Data provider backed by the SMARD chart-data HTTP API.
#[derive(Clone)]
pub struct SmardHttpSource {
    client: SmardClient,
}

impl SmardHttpSource {
    pub fn new(client: SmardClient) -> Self {
        Self { client }
    }

    pub fn from_config(cfg: &SmardConfig) -> Result<Self, smard_client::ApiError> {
        let client = SmardClient::new(cfg.base_url.clone(), cfg.region.clone(), cfg.resolution)?;
        Ok(Self::new(client))
    }
}

#[async_trait::async_trait]
impl DataProvider for SmardHttpSource {
    async fn fetch(
        &self,
        category: Category,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Row>, FetchError> {
        match self.client.fetch_rows(category, start, end).await {
            Ok(rows) => {
                tracing::debug!(%category, rows = rows.len(), "fetched rows");
                Ok(rows)
            }
            Err(e) => {
                metrics::counter!("smard_fetch_errors_total", "category" => category.name()).increment(1);
                Err(FetchError {
                    category,
                    reason: e.to_string(),
                })
            }
        }
    }
}
