//! HTTP client for the local maildb metadata service (§6): per-message status and field
//! write-through, reached over loopback. Every call is "fire and best-effort" from the
//! caller's point of view — this crate returns a `Result` so the body handler (§4.7) and
//! the RCPT handler (§9) can each decide, per call site, whether a failure is fatal.

use async_trait::async_trait;
use fwdr_common::Domain;
use serde_json::{json, Value};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8081";

#[derive(Debug, Error)]
pub enum MaildbError {
    #[error("maildb request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Status values recorded against a message id, per §4.7's step 4/5/8 write-throughs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageStatus {
    Spam = 0,
    Processed = 1,
}

/// Best-effort metadata sink for per-message state (§6's Maildb API, §3 GLOSSARY).
#[async_trait]
pub trait MaildbClient: Send + Sync {
    /// `POST /db/domain/{name}/new/{id}` — registers a new message id.
    async fn new_message(&self, domain: &Domain, id: &str) -> Result<(), MaildbError>;

    /// `PUT /db/domain/{name}/update/{id}` with a single `{"<field>":"<value>"}` body.
    async fn update_field(&self, domain: &Domain, id: &str, field: &str, value: &str) -> Result<(), MaildbError>;

    /// `PUT /db/domain/{name}/update/{id}` with a `{"status":N}` body.
    async fn update_status(&self, domain: &Domain, id: &str, status: MessageStatus) -> Result<(), MaildbError>;

    /// Records the rule id that matched and fired for this message (§4.7: "records ...
    /// the matched rule id via maildb").
    async fn update_matched_rule(&self, domain: &Domain, id: &str, rule_id: &str) -> Result<(), MaildbError>;
}

/// The real HTTP-backed client, talking to the loopback maildb service (§6).
pub struct HttpMaildbClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMaildbClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    /// Constructs a client against a non-default base URL — used to point at a mock
    /// server in tests.
    #[must_use]
    pub fn with_base_url(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }

    async fn put(&self, domain: &Domain, id: &str, body: Value) -> Result<(), MaildbError> {
        self.client
            .put(format!("{}/db/domain/{domain}/update/{id}", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Default for HttpMaildbClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MaildbClient for HttpMaildbClient {
    async fn new_message(&self, domain: &Domain, id: &str) -> Result<(), MaildbError> {
        self.client
            .post(format!("{}/db/domain/{domain}/new/{id}", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn update_field(&self, domain: &Domain, id: &str, field: &str, value: &str) -> Result<(), MaildbError> {
        self.put(domain, id, json!({ field: value })).await
    }

    async fn update_status(&self, domain: &Domain, id: &str, status: MessageStatus) -> Result<(), MaildbError> {
        self.put(domain, id, json!({ "status": status as u8 })).await
    }

    async fn update_matched_rule(&self, domain: &Domain, id: &str, rule_id: &str) -> Result<(), MaildbError> {
        self.put(domain, id, json!({ "rule_id": rule_id })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_is_loopback_8081() {
        let client = HttpMaildbClient::new();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn message_status_values_match_wire_encoding() {
        assert_eq!(MessageStatus::Spam as u8, 0);
        assert_eq!(MessageStatus::Processed as u8, 1);
    }
}
