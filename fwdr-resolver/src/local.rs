use std::path::PathBuf;

use async_trait::async_trait;
use fwdr_common::domain::{DomainRecord, DomainStatus};
use fwdr_common::Domain;
use fwdr_rules::{Action, Predicate, Rule};
use serde::Deserialize;

use crate::{DomainResolver, ResolverError};

/// The nil UUID string used to normalize rule ids loaded from a local YAML file (GLOSSARY,
/// §4.4): local mode has no central id authority, so every locally-defined rule shares the
/// same well-known placeholder id.
pub const NIL_RULE_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<LocalRule>,
}

#[derive(Debug, Deserialize)]
struct LocalRule {
    #[serde(rename = "match", default)]
    matches: Vec<Predicate>,
    #[serde(default)]
    action: Vec<Action>,
}

/// Reads domain activation and rules from `{root}/domain.d/{name}.yaml` (§4.4, §6).
pub struct LocalDomainResolver {
    root: PathBuf,
}

impl LocalDomainResolver {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn rule_file_path(&self, domain: &str) -> PathBuf {
        self.root.join("domain.d").join(format!("{domain}.yaml"))
    }
}

#[async_trait]
impl DomainResolver for LocalDomainResolver {
    async fn resolve_domain_config(&self, domain: &str) -> Result<Option<DomainRecord>, ResolverError> {
        let path = self.rule_file_path(domain);
        let status = if tokio::fs::try_exists(&path).await? {
            DomainStatus::Active
        } else {
            DomainStatus::Uncomplete
        };

        Ok(Some(DomainRecord { name: Domain::from(domain), status }))
    }

    async fn resolve_domain_rules(&self, domain: &str) -> Result<Vec<Rule>, ResolverError> {
        let path = self.rule_file_path(domain);

        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let file: RuleFile = serde_yaml::from_str(&contents)?;

        Ok(file
            .rules
            .into_iter()
            .map(|rule| Rule { id: NIL_RULE_ID.to_string(), matches: rule.matches, action: rule.action })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn write_domain_file(root: &std::path::Path, name: &str, contents: &str) {
        let dir = root.join("domain.d");
        std::fs::create_dir_all(&dir).unwrap();
        let mut file = std::fs::File::create(dir.join(format!("{name}.yaml"))).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn present_file_yields_active_status() {
        let dir = tempfile::tempdir().unwrap();
        write_domain_file(dir.path(), "example.com", "rules: []\n");

        let resolver = LocalDomainResolver::new(dir.path().to_path_buf());
        let record = resolver.resolve_domain_config("example.com").await.unwrap().unwrap();
        assert_eq!(record.status, DomainStatus::Active);
    }

    #[tokio::test]
    async fn absent_file_yields_uncomplete_status() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = LocalDomainResolver::new(dir.path().to_path_buf());
        let record = resolver.resolve_domain_config("nope.com").await.unwrap().unwrap();
        assert_eq!(record.status, DomainStatus::Uncomplete);
    }

    #[tokio::test]
    async fn rule_ids_are_normalized_to_the_nil_uuid() {
        let dir = tempfile::tempdir().unwrap();
        write_domain_file(
            dir.path(),
            "example.com",
            r#"
            rules:
              - match:
                  - type: ALL
                action:
                  - type: DROP
            "#,
        );

        let resolver = LocalDomainResolver::new(dir.path().to_path_buf());
        let rules = resolver.resolve_domain_rules("example.com").await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, NIL_RULE_ID);
    }

    #[tokio::test]
    async fn absent_file_yields_no_rules() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = LocalDomainResolver::new(dir.path().to_path_buf());
        let rules = resolver.resolve_domain_rules("nope.com").await.unwrap();
        assert!(rules.is_empty());
    }
}
