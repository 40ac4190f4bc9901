//! Airtable record store client: append-only row creation.

use crate::ideas::IdeaRecord;
use serde::Serialize;

const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("record store api error: {0}")]
    Api(String),
}

/// Client for one Airtable base/table pair.
#[derive(Clone)]
pub struct AirtableClient {
    base_url: String,
    api_key: String,
    base_id: String,
    table: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreateRecordsRequest<'a> {
    records: Vec<RecordEnvelope<'a>>,
}

#[derive(Debug, Serialize)]
struct RecordEnvelope<'a> {
    fields: &'a IdeaRecord,
}

impl AirtableClient {
    pub fn new(
        api_key: String,
        base_id: String,
        table: String,
        base_url: Option<String>,
    ) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| AIRTABLE_API_BASE.to_string());
        Self {
            base_url,
            api_key,
            base_id,
            table,
            client: reqwest::Client::new(),
        }
    }

    /// Create one row in the table. The write is append-only and the response body is
    /// never inspected; a non-success status is the only failure signal.
    pub async fn create_record(&self, record: &IdeaRecord) -> Result<(), StoreError> {
        let url = format!("{}/{}/{}", self.base_url, self.base_id, self.table);
        let body = CreateRecordsRequest {
            records: vec![RecordEnvelope { fields: record }],
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(StoreError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}
