//! Per-SMTP-session scratch state (§3): the session id, the resolved domain, and the
//! on-disk buffer. Created on first accepted `RCPT TO`; destroyed when the transaction
//! completes or the connection drops (the `ScratchGuard` is released, removing the file).

use std::sync::Arc;

use fwdr_common::{config::Config, DomainRecord};
use uuid::Uuid;

use crate::scratch::{self, ScratchGuard};

/// `{ id, domain, buffer_path, config }` (§3).
pub struct Session {
    pub id: Uuid,
    pub domain: DomainRecord,
    pub buffer: ScratchGuard,
    pub config: Arc<Config>,
}

impl Session {
    /// Allocates a fresh session for a just-accepted `RCPT TO` (§3, §4.5): a random
    /// UUIDv4 id and the scratch file path derived from it under `config.root`.
    #[must_use]
    pub fn new(domain: DomainRecord, config: Arc<Config>) -> Self {
        let id = Uuid::new_v4();
        let path = scratch::buffer_path(&config.root, id);

        Self { id, domain, buffer: ScratchGuard::new(path), config }
    }
}

#[cfg(test)]
mod tests {
    use fwdr_common::domain::DomainStatus;
    use fwdr_common::Domain;

    use super::*;

    #[test]
    fn new_session_gets_a_fresh_id_and_a_path_under_runtime_root() {
        let config = Arc::new(Config { root: "/var/lib/fwdr".into(), ..Config::default() });
        let domain = DomainRecord { name: Domain::from("example.com"), status: DomainStatus::Active };

        let session = Session::new(domain, config);
        assert!(session.buffer.path().starts_with("/var/lib/fwdr"));
        assert!(session.buffer.path().to_string_lossy().ends_with(".eml"));
    }

    #[test]
    fn two_sessions_get_distinct_ids() {
        let config = Arc::new(Config::default());
        let domain = DomainRecord { name: Domain::from("example.com"), status: DomainStatus::Active };

        let a = Session::new(domain.clone(), config.clone());
        let b = Session::new(domain, config);
        assert_ne!(a.id, b.id);
    }
}
