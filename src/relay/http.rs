//! HTTP relay control client
//!
//! Talks to the relay's control API: path registration before publishing
//! and the per-stream producer/consumer listing the manager polls.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RelayService, RelayStreamStats};
use crate::error::{Error, Result};

/// reqwest-backed relay client
pub struct HttpRelay {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Serialize)]
struct AddPathBody<'a> {
    source: &'a str,
}

#[derive(Deserialize)]
struct PathList {
    items: Vec<PathItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathItem {
    name: String,
    #[serde(default)]
    producer_count: u32,
    #[serde(default)]
    consumer_count: u32,
}

impl HttpRelay {
    /// Create a client for the control API at `api_url`
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn add_path_url(&self, name: &str) -> String {
        format!("{}/v3/config/paths/add/{}", self.api_url, name)
    }

    fn list_url(&self) -> String {
        format!("{}/v3/paths/list", self.api_url)
    }
}

/// Whether a failed create response means the path is already configured
///
/// The relay answers a duplicate add with 409, or 400 carrying an
/// "already exists" message. Other 400s are genuine request errors and
/// must not be mistaken for an existing path.
fn is_duplicate_path(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::CONFLICT
        || (status == reqwest::StatusCode::BAD_REQUEST && body.contains("already exists"))
}

#[async_trait]
impl RelayService for HttpRelay {
    async fn create(&self, name: &str, source: &str) -> Result<()> {
        let response = self
            .client
            .post(self.add_path_url(name))
            .json(&AddPathBody { source })
            .send()
            .await
            .map_err(|e| Error::Relay(format!("create {}: {}", name, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        // A path left behind by a reclaimed stream is reused by name
        if is_duplicate_path(status, &body) {
            tracing::debug!(stream = name, %status, "relay path already exists, reusing");
            return Ok(());
        }
        Err(Error::Relay(format!(
            "create {}: status {}: {}",
            name, status, body
        )))
    }

    async fn list_all(&self) -> Result<HashMap<String, RelayStreamStats>> {
        let list: PathList = self
            .client
            .get(self.list_url())
            .send()
            .await
            .map_err(|e| Error::Relay(format!("list: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::Relay(format!("list: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Relay(format!("list: malformed body: {}", e)))?;

        Ok(list
            .items
            .into_iter()
            .map(|item| {
                (
                    item.name,
                    RelayStreamStats {
                        producer_count: item.producer_count,
                        consumer_count: item.consumer_count,
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let relay = HttpRelay::new("http://127.0.0.1:9997/");
        assert_eq!(
            relay.add_path_url("stream_ab12"),
            "http://127.0.0.1:9997/v3/config/paths/add/stream_ab12"
        );
        assert_eq!(relay.list_url(), "http://127.0.0.1:9997/v3/paths/list");
    }

    #[test]
    fn test_duplicate_path_detection() {
        use reqwest::StatusCode;

        assert!(is_duplicate_path(StatusCode::CONFLICT, ""));
        assert!(is_duplicate_path(
            StatusCode::BAD_REQUEST,
            r#"{"error": "path already exists"}"#
        ));
        // A malformed create call is a real failure
        assert!(!is_duplicate_path(
            StatusCode::BAD_REQUEST,
            r#"{"error": "invalid source address"}"#
        ));
        assert!(!is_duplicate_path(StatusCode::INTERNAL_SERVER_ERROR, ""));
    }

    #[test]
    fn test_listing_deserialization() {
        let body = r#"{
            "items": [
                {"name": "stream_ab12", "producerCount": 2, "consumerCount": 0},
                {"name": "stream_cd34", "producerCount": 1, "consumerCount": 3}
            ]
        }"#;
        let list: PathList = serde_json::from_str(body).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].producer_count, 2);
        assert_eq!(list.items[1].consumer_count, 3);
    }

    #[test]
    fn test_listing_defaults_missing_counts() {
        let body = r#"{"items": [{"name": "stream_ab12"}]}"#;
        let list: PathList = serde_json::from_str(body).unwrap();
        assert_eq!(list.items[0].producer_count, 0);
        assert_eq!(list.items[0].consumer_count, 0);
    }
}
