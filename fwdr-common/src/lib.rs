pub mod address;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod message;

pub use domain::{Domain, DomainRecord, DomainStatus};
pub use envelope::Envelope;
pub use message::Message;

/// Re-exported so the `internal!`/`incoming!`/`outgoing!` macros can refer to `$crate::tracing`
/// from any crate that depends on `fwdr-common`.
pub use tracing;

/// Broadcast across every listener and session to coordinate graceful shutdown (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
