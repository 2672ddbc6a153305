//! Client for the external report/journal API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CommandError, Result};

/// Timeout for report/journal API calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Location and key of the external API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL including the `/api` prefix.
    pub base_url: String,
    pub api_key: String,
}

/// Journal entry posted to the API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JournalPayload {
    pub no_lid: String,
    pub kelas: String,
    pub materi: String,
    pub keterangan: String,
    /// Photo as a `data:` URI.
    pub foto: String,
    /// ISO `YYYY-MM-DD` date.
    pub tanggal: String,
}

#[derive(Debug, Deserialize)]
struct JournalResponse {
    status: String,
    data: Option<JournalResponseData>,
}

#[derive(Debug, Deserialize)]
struct JournalResponseData {
    jurnal_data: JournalData,
}

/// Confirmed journal entry as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct JournalData {
    pub nama_guru: String,
    pub tanggal: String,
}

/// HTTP client for the report and journal endpoints.
pub struct SchoolApi {
    http: reqwest::Client,
    config: ApiConfig,
}

impl SchoolApi {
    pub fn new(config: ApiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Fetches a report PDF. `query` is the pre-built query string.
    pub async fn fetch_report_pdf(&self, query: &str) -> Result<Vec<u8>> {
        let url = format!("{}/get_laporan_pdf?{query}", self.config.base_url);
        debug!(url = %url, "Fetching report PDF");

        let response = self
            .http
            .get(&url)
            .header("X-API-Key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CommandError::ApiStatus(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Creates a journal entry and returns the confirmed record.
    pub async fn create_journal(&self, payload: &JournalPayload) -> Result<JournalData> {
        let url = format!("{}/create_jurnal", self.config.base_url);
        debug!(url = %url, kelas = %payload.kelas, "Creating journal entry");

        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.config.api_key)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CommandError::ApiStatus(response.status().as_u16()));
        }

        let body: JournalResponse = response.json().await?;
        if body.status != "success" {
            return Err(CommandError::ApiRejected(body.status));
        }
        body.data
            .map(|data| data.jurnal_data)
            .ok_or_else(|| CommandError::ApiRejected("missing jurnal_data".to_string()))
    }
}
