//! Authenticated HTTP backend for the domain resolver (§4.4): bearer-authenticated GET
//! against the config API, retried on transient failure with capped linear backoff.

use std::time::Duration;

use async_trait::async_trait;
use fwdr_common::domain::{DomainRecord, DomainStatus};
use fwdr_common::Domain;
use fwdr_rules::Rule;
use serde::{de::DeserializeOwned, Deserialize};

use crate::{DomainResolver, ResolverError};

const API_BASE: &str = "https://apiv1.mailway.app";
const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_STEP: Duration = Duration::from_millis(200);

/// The `{ok, data, error}` envelope every config API response is wrapped in (§6).
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct DomainPayload {
    name: String,
    status: u8,
}

#[derive(Debug, Deserialize)]
struct RulePayload {
    id: String,
    #[serde(rename = "match")]
    matches: Vec<fwdr_rules::Predicate>,
    action: Vec<fwdr_rules::Action>,
}

/// Talks to the central config API at `{API_BASE}/instance/{server_id}/...` (§4.4, §6).
pub struct RemoteDomainResolver {
    client: reqwest::Client,
    server_id: String,
    bearer_token: String,
}

impl RemoteDomainResolver {
    #[must_use]
    pub fn new(server_id: String, bearer_token: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("fwdr")
                .build()
                .unwrap_or_default(),
            server_id,
            bearer_token,
        }
    }

    fn domain_url(&self, name: &str) -> String {
        format!("{API_BASE}/instance/{}/domain/{name}", self.server_id)
    }

    fn rules_url(&self, name: &str) -> String {
        format!("{API_BASE}/instance/{}/domain/{name}/rules", self.server_id)
    }

    /// Issues `GET url`, retrying transient failures up to `MAX_ATTEMPTS` times with a
    /// capped linear backoff. A `404` response short-circuits to `Ok(None)` without
    /// consuming a retry, per §4.4's "404 is not an error" rule.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, ResolverError> {
        let mut last_err = None;

        for attempt in 0..MAX_ATTEMPTS {
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.bearer_token)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => return Ok(None),
                Ok(resp) if resp.status().is_success() => {
                    let envelope: Envelope<T> = resp
                        .json()
                        .await
                        .map_err(|e| ResolverError::Request(e.to_string()))?;

                    return if envelope.ok {
                        Ok(envelope.data)
                    } else {
                        Err(ResolverError::Application(envelope.error))
                    };
                }
                Ok(resp) => {
                    last_err = Some(ResolverError::Request(format!(
                        "unexpected status {}",
                        resp.status()
                    )));
                }
                Err(err) => last_err = Some(ResolverError::Request(err.to_string())),
            }

            tokio::time::sleep(BACKOFF_STEP * (attempt + 1)).await;
        }

        Err(last_err.unwrap_or_else(|| ResolverError::Request("exhausted retries".to_string())))
    }
}

#[async_trait]
impl DomainResolver for RemoteDomainResolver {
    async fn resolve_domain_config(&self, domain: &str) -> Result<Option<DomainRecord>, ResolverError> {
        let payload: Option<DomainPayload> = self.get(&self.domain_url(domain)).await?;

        Ok(payload.map(|p| DomainRecord {
            name: Domain::from(p.name),
            status: if p.status == DomainStatus::Active as u8 {
                DomainStatus::Active
            } else {
                DomainStatus::Uncomplete
            },
        }))
    }

    async fn resolve_domain_rules(&self, domain: &str) -> Result<Vec<Rule>, ResolverError> {
        let payload: Option<Vec<RulePayload>> = self.get(&self.rules_url(domain)).await?;

        Ok(payload
            .unwrap_or_default()
            .into_iter()
            .map(|p| Rule { id: p.id, matches: p.matches, action: p.action })
            .collect())
    }
}
