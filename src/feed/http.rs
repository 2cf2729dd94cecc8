use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;

use super::ScheduleFeed;
use crate::error::Error;
use crate::models::{CollectRequest, CollectionStatus, LocationRecord, ScheduleEntry};
use crate::shift::Shift;

#[derive(Debug, Clone)]
pub struct HttpScheduleFeed {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpScheduleFeed {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Backend(format!("invalid backend url {base_url}: {e}")))?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Backend(format!("backend url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Reads a list endpoint. A 404 means no entries; a body that is not a
    /// list is logged and read as empty.
    async fn fetch_list(&self, url: Url) -> Result<Vec<ScheduleEntry>, Error> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Backend(format!("GET {url}: {e}")))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status == StatusCode::NOT_FOUND {
            tracing::info!(
                url = %url,
                message = body.get("message").and_then(serde_json::Value::as_str).unwrap_or(""),
                "No schedules found"
            );
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Error::Backend(format!("GET {url} answered {status}")));
        }

        let Value::Array(items) = body else {
            let err = Error::UnexpectedResponseShape(url.to_string());
            tracing::warn!(error = %err, "Expected a list of schedules, treating as empty");
            return Ok(Vec::new());
        };

        let entries = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ScheduleEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Skipping malformed schedule entry");
                    None
                }
            })
            .collect();

        Ok(entries)
    }
}

#[async_trait]
impl ScheduleFeed for HttpScheduleFeed {
    async fn fetch_shift(&self, shift: Shift) -> Result<Vec<ScheduleEntry>, Error> {
        let url = match shift {
            Shift::Backlog => self.endpoint(&["backlogs"])?,
            other => self.endpoint(&["schedules", "today", other.as_str()])?,
        };
        self.fetch_list(url).await
    }

    async fn set_collection(&self, schedule_id: &str, status: CollectionStatus) -> Result<(), Error> {
        let url = self.endpoint(&["schedules", schedule_id, "collect"])?;

        let response = self
            .http
            .put(url.clone())
            .json(&CollectRequest { collection: status })
            .send()
            .await
            .map_err(|e| Error::Persistence(format!("PUT {url}: {e}")))?;

        if !response.status().is_success() {
            let status_code = response.status();
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            return Err(Error::Persistence(format!(
                "PUT {url} answered {status_code} {message}"
            )));
        }

        tracing::info!(schedule_id, collection = ?status, "Collection status saved");
        Ok(())
    }

    async fn location_by_name(&self, name: &str) -> Result<LocationRecord, Error> {
        let url = self.endpoint(&["locations", "name", name])?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Backend(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Backend(format!("GET {url} answered {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|_| Error::UnexpectedResponseShape(url.to_string()))
    }
}
