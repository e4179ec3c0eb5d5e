use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use smard_client::{Category, Row};
use time::OffsetDateTime;

use crate::pipeline::{BusError, DataProvider, FetchError, Publisher};

/// In-memory bus that records retained messages and fails chosen topics.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, String, bool)>>,
    failing: HashSet<String>,
}

impl RecordingPublisher {
    pub fn failing_on(mut self, topic: &str) -> Self {
        self.failing.insert(topic.to_string());
        self
    }

    pub fn messages(&self) -> Vec<(String, String, bool)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn payload(&self, topic: &str) -> Option<String> {
        self.messages()
            .into_iter()
            .rev()
            .find(|(t, _, _)| t == topic)
            .map(|(_, payload, _)| payload)
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), BusError> {
        if self.failing.contains(topic) {
            return Err(BusError(format!("refused {topic}")));
        }
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload, retain));
        Ok(())
    }
}

/// Provider serving canned rows per category and recording each request.
#[derive(Default)]
pub struct StaticProvider {
    rows: HashMap<Category, Vec<Row>>,
    failing: HashSet<Category>,
    requests: Mutex<Vec<(Category, OffsetDateTime, OffsetDateTime)>>,
}

impl StaticProvider {
    pub fn with_rows(mut self, category: Category, rows: Vec<Row>) -> Self {
        self.rows.insert(category, rows);
        self
    }

    pub fn with_failure(mut self, category: Category) -> Self {
        self.failing.insert(category);
        self
    }

    pub fn requests(&self) -> Vec<(Category, OffsetDateTime, OffsetDateTime)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DataProvider for StaticProvider {
    async fn fetch(
        &self,
        category: Category,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Row>, FetchError> {
        self.requests.lock().unwrap().push((category, start, end));

        if self.failing.contains(&category) {
            return Err(FetchError {
                category,
                reason: "connection reset".to_string(),
            });
        }
        Ok(self.rows.get(&category).cloned().unwrap_or_default())
    }
}
