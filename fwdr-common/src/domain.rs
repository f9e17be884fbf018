use std::{fmt, ops::Deref, sync::Arc};

use serde::{Deserialize, Serialize};

/// A domain name, cheaply cloneable.
///
/// Wraps `Arc<str>` rather than `String` because a single domain name is read from many
/// tasks concurrently (rate limiter, resolver, maildb client) without ever being mutated.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Domain(Arc<str>);

impl Domain {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Domain").field(&self.0).finish()
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Domain {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Domain {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for Domain {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Activation status of a domain record, as returned by the resolver (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DomainStatus {
    Uncomplete = 0,
    Active = 1,
}

/// A resolved domain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub name: Domain,
    pub status: DomainStatus,
}

impl DomainRecord {
    #[must_use]
    pub const fn accepts_mail(&self) -> bool {
        matches!(self.status, DomainStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_display_matches_source_string() {
        let domain = Domain::from("example.com");
        assert_eq!(domain.to_string(), "example.com");
        assert_eq!(domain.as_str(), "example.com");
    }

    #[test]
    fn domain_equality_is_value_based() {
        let a = Domain::from("example.com");
        let b = Domain::from("example.com".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn active_record_accepts_mail() {
        let record = DomainRecord {
            name: Domain::from("example.com"),
            status: DomainStatus::Active,
        };
        assert!(record.accepts_mail());

        let record = DomainRecord {
            status: DomainStatus::Uncomplete,
            ..record
        };
        assert!(!record.accepts_mail());
    }
}
