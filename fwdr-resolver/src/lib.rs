//! Domain and rule resolution, behind a single trait with two backends (§4.4): an
//! authenticated remote HTTP API, and a local YAML file tree.

pub mod local;
pub mod remote;

use async_trait::async_trait;
use fwdr_common::DomainRecord;
use fwdr_rules::Rule;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("request to config API failed after retries: {0}")]
    Request(String),

    #[error("config API returned an application-level error: {0}")]
    Application(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse local rule file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Resolves a recipient domain to its activation record and rule list (§4.4). Fetched fresh
/// on every `RCPT TO` — never cached across sessions (§3).
#[async_trait]
pub trait DomainResolver: Send + Sync {
    async fn resolve_domain_config(&self, domain: &str) -> Result<Option<DomainRecord>, ResolverError>;

    async fn resolve_domain_rules(&self, domain: &str) -> Result<Vec<Rule>, ResolverError>;
}
