//! Elasticsearch implementation of [`BulkIndex`].
//!
//! Upserts and deletes go through the `_bulk` API as NDJSON. Per-item
//! statuses are mapped to [`AddOutcome`] / [`DeleteOutcome`]; a delete that
//! comes back as 404 is [`DeleteOutcome::NotFound`].

use async_trait::async_trait;
use fbi_core::{AddOutcome, BulkIndex, DeleteOutcome, DocumentId, IndexError, IndexOperation};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::mapping::file_index_mapping;

/// Connection settings for [`ElasticsearchIndex`].
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub url: String,
    /// Index holding the file documents
    pub index: String,
    /// API key sent with every request
    pub api_key: Option<String>,
    /// Header carrying the API key. `Authorization` sends it under the
    /// `ApiKey` scheme, any other header sends the bare key.
    pub api_key_header: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Bulk index client talking to Elasticsearch over HTTP.
pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticsearchIndex {
    /// Build a client. No request is made until the first call.
    pub fn new(config: ElasticsearchConfig) -> Result<Self, IndexError> {
        let headers = auth_headers(&config)?;
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send_bulk(&self, body: String) -> Result<BulkResponse, IndexError> {
        let response = self
            .client
            .post(self.url("_bulk"))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IndexError::Transport(format!("bulk request failed ({status}): {text}")));
        }

        response.json::<BulkResponse>().await.map_err(transport)
    }
}

/// Default header for the API key.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

fn auth_headers(config: &ElasticsearchConfig) -> Result<HeaderMap, IndexError> {
    let mut headers = HeaderMap::new();
    let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return Ok(headers);
    };

    let name = HeaderName::from_bytes(config.api_key_header.trim().as_bytes())
        .map_err(|e| IndexError::Transport(format!("invalid api key header: {e}")))?;
    let value = if name == AUTHORIZATION {
        format!("ApiKey {key}")
    } else {
        key.to_string()
    };
    let mut value = HeaderValue::from_str(&value)
        .map_err(|e| IndexError::Transport(format!("invalid api key: {e}")))?;
    value.set_sensitive(true);

    headers.insert(name, value);
    Ok(headers)
}

fn transport(err: reqwest::Error) -> IndexError {
    IndexError::Transport(err.to_string())
}

#[async_trait]
impl BulkIndex for ElasticsearchIndex {
    async fn refresh_mapping(&self) -> Result<(), IndexError> {
        let mapping = file_index_mapping();
        let response = self
            .client
            .put(self.url(&format!("{}/_mapping", self.index)))
            .json(&mapping)
            .send()
            .await
            .map_err(transport)?;

        let response = if response.status() == StatusCode::NOT_FOUND {
            info!("Index {} does not exist, creating it", self.index);
            self.client
                .put(self.url(&self.index))
                .json(&json!({ "mappings": mapping }))
                .send()
                .await
                .map_err(transport)?
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IndexError::Mapping(format!("{status}: {text}")));
        }

        debug!("Mapping refreshed for {}", self.index);
        Ok(())
    }

    async fn add(&self, operations: &[IndexOperation]) -> Result<Vec<AddOutcome>, IndexError> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        let body = build_add_body(&self.index, operations)?;
        let response = self.send_bulk(body).await?;
        add_outcomes(response, operations.len())
    }

    async fn delete(&self, ids: &[DocumentId]) -> Result<Vec<DeleteOutcome>, IndexError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = build_delete_body(&self.index, ids)?;
        let response = self.send_bulk(body).await?;
        delete_outcomes(response, ids.len())
    }
}

// ============================================================================
// Bulk encoding
// ============================================================================

fn build_add_body(index: &str, operations: &[IndexOperation]) -> Result<String, IndexError> {
    let mut body = String::new();
    for op in operations {
        let action = json!({ "index": { "_index": index, "_id": op.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&op.document)?);
        body.push('\n');
    }
    Ok(body)
}

fn build_delete_body(index: &str, ids: &[DocumentId]) -> Result<String, IndexError> {
    let mut body = String::new();
    for id in ids {
        let action = json!({ "delete": { "_index": index, "_id": id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
    }
    Ok(body)
}

// ============================================================================
// Bulk decoding
// ============================================================================

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl BulkItem {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn reason(&self) -> String {
        match &self.error {
            Some(Value::Object(err)) => err
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(err.clone()).to_string()),
            Some(other) => other.to_string(),
            None => format!("status {}", self.status),
        }
    }
}

/// Flatten `[{"index": {...}}, ...]` into the item bodies, checking the count.
fn items(response: BulkResponse, expected: usize) -> Result<Vec<BulkItem>, IndexError> {
    let items: Vec<BulkItem> = response
        .items
        .into_iter()
        .filter_map(|item| item.into_values().next())
        .collect();

    if items.len() != expected {
        return Err(IndexError::ResultCount {
            expected,
            found: items.len(),
        });
    }
    Ok(items)
}

fn add_outcomes(response: BulkResponse, expected: usize) -> Result<Vec<AddOutcome>, IndexError> {
    Ok(items(response, expected)?
        .into_iter()
        .map(|item| {
            if item.is_success() {
                AddOutcome::Indexed
            } else {
                AddOutcome::Failed(item.reason())
            }
        })
        .collect())
}

fn delete_outcomes(
    response: BulkResponse,
    expected: usize,
) -> Result<Vec<DeleteOutcome>, IndexError> {
    Ok(items(response, expected)?
        .into_iter()
        .map(|item| {
            if item.is_success() {
                DeleteOutcome::Deleted
            } else if item.status == StatusCode::NOT_FOUND.as_u16() {
                DeleteOutcome::NotFound
            } else {
                DeleteOutcome::Failed(item.reason())
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbi_core::{FileInfo, MetadataDocument, LOCATION_ON_DISK};

    fn response(value: Value) -> BulkResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_build_add_body() {
        let op = IndexOperation {
            id: DocumentId::for_path("/data/obs/readme"),
            document: MetadataDocument {
                info: FileInfo::for_path("/data/obs/readme", Some(120), LOCATION_ON_DISK),
            },
        };

        let body = build_add_body("fbi", &[op.clone()]).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], "fbi");
        assert_eq!(action["index"]["_id"], op.id.as_str());

        let doc: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["info"]["name"], "readme");
        assert_eq!(doc["info"]["size"], 120);
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_build_delete_body() {
        let ids = vec![DocumentId::for_path("/a"), DocumentId::for_path("/b")];
        let body = build_delete_body("fbi", &ids).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);

        let action: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(action["delete"]["_id"], ids[1].as_str());
    }

    #[test]
    fn test_add_outcomes() {
        let resp = response(json!({
            "errors": true,
            "items": [
                {"index": {"_id": "a", "status": 201}},
                {"index": {"_id": "b", "status": 400, "error": {"type": "mapper_parsing_exception", "reason": "bad size"}}}
            ]
        }));

        let outcomes = add_outcomes(resp, 2).unwrap();
        assert_eq!(
            outcomes,
            vec![AddOutcome::Indexed, AddOutcome::Failed("bad size".to_string())]
        );
    }

    #[test]
    fn test_delete_outcomes_distinguish_not_found() {
        let resp = response(json!({
            "errors": true,
            "items": [
                {"delete": {"_id": "a", "status": 200, "result": "deleted"}},
                {"delete": {"_id": "b", "status": 404, "result": "not_found"}},
                {"delete": {"_id": "c", "status": 429, "error": {"type": "es_rejected_execution_exception", "reason": "queue full"}}}
            ]
        }));

        let outcomes = delete_outcomes(resp, 3).unwrap();
        assert_eq!(
            outcomes,
            vec![
                DeleteOutcome::Deleted,
                DeleteOutcome::NotFound,
                DeleteOutcome::Failed("queue full".to_string()),
            ]
        );
    }

    #[test]
    fn test_outcome_count_mismatch() {
        let resp = response(json!({"items": []}));
        let err = delete_outcomes(resp, 1).unwrap_err();
        assert!(matches!(err, IndexError::ResultCount { expected: 1, found: 0 }));
    }

    fn config(api_key: Option<&str>, header: &str) -> ElasticsearchConfig {
        ElasticsearchConfig {
            url: "http://localhost:9200/".to_string(),
            index: "fbi".to_string(),
            api_key: api_key.map(str::to_string),
            api_key_header: header.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let index = ElasticsearchIndex::new(config(Some("secret"), DEFAULT_API_KEY_HEADER)).unwrap();
        assert_eq!(index.url("_bulk"), "http://localhost:9200/_bulk");
    }

    #[test]
    fn test_api_key_sent_as_x_api_key_by_default() {
        let headers = auth_headers(&config(Some("secret"), DEFAULT_API_KEY_HEADER)).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["x-api-key"], "secret");
    }

    #[test]
    fn test_api_key_under_authorization_scheme() {
        let headers = auth_headers(&config(Some("secret"), "Authorization")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "ApiKey secret");
        assert!(headers.get("x-api-key").is_none());
    }

    #[test]
    fn test_no_api_key_sends_no_header() {
        assert!(auth_headers(&config(None, DEFAULT_API_KEY_HEADER)).unwrap().is_empty());
        assert!(auth_headers(&config(Some(""), DEFAULT_API_KEY_HEADER)).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_api_key_header_is_rejected() {
        let err = auth_headers(&config(Some("secret"), "bad header")).unwrap_err();
        assert!(matches!(err, IndexError::Transport(_)));
    }
}
