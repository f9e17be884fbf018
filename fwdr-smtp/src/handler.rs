//! The two extension points the connection driver calls into (§4.5): a recipient handler run
//! on every `RCPT TO`, and a body handler run once the `DATA` terminator is seen. Both are
//! implemented by `fwdr-pipeline`; `fwdr-smtp` only depends on the trait shape, keeping the
//! wire protocol decoupled from domain resolution, rate limiting, and rule evaluation.

use async_trait::async_trait;
use fwdr_common::error::PipelineError;
use fwdr_session::Session;

/// Called on each accepted `RCPT TO`, per §4.5. Returning `false` replies `550` and keeps the
/// envelope open for further recipients; `Ok` with a session populates `*session` on the
/// first accepted recipient of the connection.
#[async_trait]
pub trait RecipientHandler: Send + Sync {
    async fn handle_rcpt(&self, session: &mut Option<Session>, mail_from: Option<&str>, rcpt_to: &str) -> bool;
}

/// Called once on the `DATA` terminator with the accumulated (dot-unstuffed) message bytes.
/// Any `Err` is rendered back to the client via [`PipelineError::smtp_reply`] (§4.5, §4.7).
#[async_trait]
pub trait BodyHandler: Send + Sync {
    async fn handle_body(&self, session: &Session, mail_from: Option<&str>, rcpt_to: &[String], raw: Vec<u8>) -> Result<(), PipelineError>;
}
