//! HTTP implementation of the submission boundary.
//!
//! Routes (relative to the configured base URL):
//!
//! | request | route | body |
//! |---|---|---|
//! | single | `POST /sync/{type}` | the item |
//! | batch | `POST /sync/{type}/batch` | `{"items": [...]}` |
//! | merged | `POST /sync/{type}/merged` | `{"record", "sourceIds", "owner"}` |
//!
//! Every request carries an `Idempotency-Key` built from the covered
//! operation ids, so redelivery after a lost response is safe on the server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use shiftsync_core::sync::ports::{ItemOutcome, ItemResult};
use shiftsync_core::{SubmissionError, SubmissionReceipt, SubmissionRequest, Submitter};
use shiftsync_domain::{Result, SubmissionConfig};
use tracing::{debug, instrument, warn};

use super::client::HttpClient;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const MAX_MESSAGE_LEN: usize = 200;

/// [`Submitter`] posting to the `/sync/{type}` endpoints
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    client: HttpClient,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptBody {
    #[serde(default, alias = "id")]
    confirmation_id: Option<String>,
    #[serde(default)]
    results: Option<Vec<ItemBody>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody {
    operation_id: String,
    status: String,
    #[serde(default)]
    confirmation_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    retryable: bool,
}

impl HttpSubmitter {
    /// Submitter rooted at `base_url`
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn from_config(config: &SubmissionConfig) -> Result<Self> {
        Ok(Self::new(HttpClient::from_config(config)?, config.base_url.clone()))
    }

    fn route(&self, request: &SubmissionRequest) -> (String, Value) {
        let op_type = request.op_type().as_str();
        match request {
            SubmissionRequest::Single(item) => {
                (format!("{}/sync/{op_type}", self.base_url), json!(item))
            }
            SubmissionRequest::Batch { items, .. } => {
                (format!("{}/sync/{op_type}/batch", self.base_url), json!({ "items": items }))
            }
            SubmissionRequest::Merged { record, source_ids, owner, .. } => (
                format!("{}/sync/{op_type}/merged", self.base_url),
                json!({ "record": record, "sourceIds": source_ids, "owner": owner }),
            ),
        }
    }

    fn classify_transport(&self, err: &reqwest::Error) -> SubmissionError {
        if err.is_timeout() {
            return SubmissionError::Timeout(self.client.timeout());
        }
        if err.is_connect() {
            return SubmissionError::Connectivity(err.to_string());
        }
        if err.is_builder() {
            return SubmissionError::Invalid(err.to_string());
        }
        SubmissionError::Transient(err.to_string())
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    #[instrument(skip(self, request), fields(op_type = %request.op_type(), items = request.operation_ids().len()))]
    async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> std::result::Result<SubmissionReceipt, SubmissionError> {
        let (url, body) = self.route(&request);
        let builder = self
            .client
            .request(Method::POST, &url)
            .header(IDEMPOTENCY_HEADER, request.idempotency_key())
            .json(&body);

        let response =
            self.client.send(builder).await.map_err(|err| self.classify_transport(&err))?;
        let status = response.status();

        if !status.is_success() {
            let error = status_error(response).await;
            warn!(%status, error = %error, "submission rejected by server");
            return Err(error);
        }

        let text = response.text().await.map_err(|err| self.classify_transport(&err))?;
        let receipt = parse_receipt(&text);
        debug!(%status, confirmation_id = ?receipt.confirmation_id, "submission accepted");
        Ok(receipt)
    }
}

async fn status_error(response: Response) -> SubmissionError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let message = response.text().await.unwrap_or_default();
    classify_status(status, retry_after, &message)
}

/// Map a non-success status onto the failure taxonomy
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> SubmissionError {
    let code = status.as_u16();
    let message = summarize(status, body);
    match code {
        429 => SubmissionError::RateLimited { retry_after },
        408 | 500..=599 => SubmissionError::Server { status: code, message },
        _ => SubmissionError::Rejected { status: code, message },
    }
}

fn summarize(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status.canonical_reason().unwrap_or("unknown status").to_string();
    }
    body.chars().take(MAX_MESSAGE_LEN).collect()
}

/// Empty or non-JSON bodies are an acceptance without confirmation
fn parse_receipt(text: &str) -> SubmissionReceipt {
    if text.trim().is_empty() {
        return SubmissionReceipt::default();
    }
    let body: ReceiptBody = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(err) => {
            debug!(error = %err, "response body is not a receipt, treating as accepted");
            return SubmissionReceipt::default();
        }
    };

    SubmissionReceipt {
        confirmation_id: body.confirmation_id,
        item_results: body.results.map(|items| items.into_iter().map(item_result).collect()),
    }
}

fn item_result(item: ItemBody) -> ItemResult {
    let outcome = if item.status.eq_ignore_ascii_case("accepted")
        || item.status.eq_ignore_ascii_case("ok")
    {
        ItemOutcome::Accepted { confirmation_id: item.confirmation_id }
    } else {
        let message = item.error.unwrap_or_else(|| item.status.clone());
        if item.retryable {
            ItemOutcome::Rejected(SubmissionError::Transient(message))
        } else {
            ItemOutcome::Rejected(SubmissionError::Rejected { status: 422, message })
        }
    };
    ItemResult { operation_id: item.operation_id, outcome }
}
