//! Orchestrates the per-message processing pipeline (§4.7): rate check, optional spam scan,
//! parse, loop detection, rule fetch, and dispatch against the rule-engine worker under a
//! wall-clock deadline. This is the one crate that wires every other `fwdr-*` crate together
//! into the two extension points `fwdr-smtp` calls into (§4.5): [`RecipientHandler`] and
//! [`BodyHandler`].

pub mod outbound;
pub mod spam;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fwdr_common::error::PipelineError;
use fwdr_common::{config::Config, Envelope, Message};
use fwdr_maildb::{MaildbClient, MessageStatus};
use fwdr_resolver::DomainResolver;
use fwdr_session::{RateLimiter, Session};
use fwdr_smtp::{BodyHandler, RecipientHandler};
use tracing::{info, warn};

/// The 60-second per-message deadline from dispatch start (§4.7 step 8, §5 "Cancellation").
const DISPATCH_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
#[error("dispatch deadline of {0:?} elapsed before a terminal action was realized")]
struct DeadlineElapsed(Duration);

/// Wires the rate limiter, domain resolver, and maildb client into the two handler traits
/// `fwdr-smtp` drives the connection against (§2's "Processing pipeline" row).
pub struct Pipeline {
    config: Arc<Config>,
    rate_limiter: Arc<RateLimiter>,
    resolver: Arc<dyn DomainResolver>,
    maildb: Arc<dyn MaildbClient>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        rate_limiter: Arc<RateLimiter>,
        resolver: Arc<dyn DomainResolver>,
        maildb: Arc<dyn MaildbClient>,
    ) -> Self {
        Self { config, rate_limiter, resolver, maildb }
    }
}

fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}

#[async_trait]
impl RecipientHandler for Pipeline {
    /// Resolves `rcpt_to`'s domain and, on the first accepted recipient of the connection,
    /// allocates the session (§3, §4.5). A domain that doesn't resolve, or resolves
    /// `UNCOMPLETE`, is refused; resolver errors are treated the same as "no such domain"
    /// since RCPT has no dedicated transient-error reply in §6.
    async fn handle_rcpt(&self, session: &mut Option<Session>, mail_from: Option<&str>, rcpt_to: &str) -> bool {
        let Some(domain_name) = domain_of(rcpt_to) else {
            return false;
        };

        let record = match self.resolver.resolve_domain_config(domain_name).await {
            Ok(Some(record)) if record.accepts_mail() => record,
            Ok(_) => return false,
            Err(err) => {
                warn!(domain = domain_name, %err, "domain resolution failed on RCPT");
                return false;
            }
        };

        if session.is_none() {
            let new_session = Session::new(record.clone(), self.config.clone());
            let id = new_session.id.to_string();

            // Best-effort: a maildb write-through failure during RCPT is logged, not fatal
            // (§7 "Locally recovered"). The `from` field is written from `mail_from`, not the
            // recipient value — the bug-for-bug "both fields get the recipient" behavior one
            // source variant exhibited is not reproduced here (§9 open questions, resolved).
            if let Err(err) = self.maildb.new_message(&record.name, &id).await {
                warn!(session = %id, %err, "maildb new_message failed");
            }
            if let Some(from) = mail_from {
                if let Err(err) = self.maildb.update_field(&record.name, &id, "from", from).await {
                    warn!(session = %id, %err, "maildb update_field(from) failed");
                }
            }

            *session = Some(new_session);
        }

        true
    }
}

#[async_trait]
impl BodyHandler for Pipeline {
    async fn handle_body(&self, session: &Session, mail_from: Option<&str>, rcpt_to: &[String], raw: Vec<u8>) -> Result<(), PipelineError> {
        let domain = &session.domain.name;
        let session_id = session.id.to_string();

        self.check_rate_limit(domain)?;

        let bytes = self.maybe_scan_for_spam(session, raw).await?;
        let message = Message::parse(bytes).map_err(PipelineError::Parse)?;

        self.write_through_metadata(domain, &session_id, &message).await?;
        self.enforce_spam_verdict(domain, &session_id, &message).await?;
        self.enforce_loop_detection(&message)?;

        let rules = self
            .resolver
            .resolve_domain_rules(domain)
            .await
            .map_err(|err| PipelineError::Config(Box::new(err)))?;

        self.dispatch(domain, &session_id, mail_from, rcpt_to, message, rules).await
    }
}

impl Pipeline {
    /// §4.7 step 1: reject if already at the limit, otherwise count this message.
    fn check_rate_limit(&self, domain: &fwdr_common::Domain) -> Result<(), PipelineError> {
        if self.rate_limiter.get_count(domain) > self.config.forwarding_rate_limiting_count {
            return Err(PipelineError::RateLimited);
        }
        self.rate_limiter.inc(domain);
        Ok(())
    }

    /// §4.7 step 2: the scratch file already holds `raw` (the connection driver writes it
    /// before calling into this handler). If spam filtering is enabled, invoke the scanner
    /// and re-read the file, since the scanner rewrites it in place with `X-Spam-Status`.
    async fn maybe_scan_for_spam(&self, session: &Session, raw: Vec<u8>) -> Result<Vec<u8>, PipelineError> {
        if !self.config.spam_filter {
            return Ok(raw);
        }

        spam::scan(session.buffer.path())
            .await
            .map_err(|err| PipelineError::Processing(Some(Box::new(err))))?;

        session.buffer.read().await.map_err(|err| PipelineError::Processing(Some(Box::new(err))))
    }

    /// §4.7 step 4: best-effort propagation of parsed `To`/`From` to maildb.
    async fn write_through_metadata(&self, domain: &fwdr_common::Domain, session_id: &str, message: &Message) -> Result<(), PipelineError> {
        for (header, field) in [("To", "to"), ("From", "from")] {
            if let Some(value) = message.header(header) {
                if !value.is_empty() {
                    self.maildb
                        .update_field(domain, session_id, field, value)
                        .await
                        .map_err(|err| PipelineError::Processing(Some(Box::new(err))))?;
                }
            }
        }
        Ok(())
    }

    /// §4.7 step 5: a spam verdict of `Yes` records the SPAM status and ends the transaction.
    async fn enforce_spam_verdict(&self, domain: &fwdr_common::Domain, session_id: &str, message: &Message) -> Result<(), PipelineError> {
        let Some(status) = message.header("X-Spam-Status") else {
            return Ok(());
        };

        if spam::is_spam(status) == Some(true) {
            if let Err(err) = self.maildb.update_status(domain, session_id, MessageStatus::Spam).await {
                warn!(session = session_id, %err, "maildb update_status(spam) failed");
            }
            return Err(PipelineError::Spam);
        }
        Ok(())
    }

    /// §4.7 step 6: too many `Received` headers means a forwarding loop.
    fn enforce_loop_detection(&self, message: &Message) -> Result<(), PipelineError> {
        let limit = self.config.forwarding_loop_detection_count as usize;
        let count = message.received_count();
        if count > limit {
            return Err(PipelineError::Loop { count, limit });
        }
        Ok(())
    }

    /// §4.7 step 8: spawns the rule-engine worker and selects over its action channels and
    /// the dispatch deadline until a terminal action is realized or every channel closes
    /// having already delivered one.
    #[allow(clippy::too_many_lines)]
    async fn dispatch(
        &self,
        domain: &fwdr_common::Domain,
        session_id: &str,
        mail_from: Option<&str>,
        rcpt_to: &[String],
        message: Message,
        rules: Vec<fwdr_rules::Rule>,
    ) -> Result<(), PipelineError> {
        let mut envelope = Envelope::new();
        if let Some(from) = mail_from {
            envelope.set_from(from.to_string());
        }
        for rcpt in rcpt_to {
            envelope.add_recipient(rcpt.clone());
        }

        let message = Arc::new(message);
        let mut channels = fwdr_dispatch::spawn(rules, Arc::clone(&message), envelope);
        let deadline = tokio::time::sleep(DISPATCH_DEADLINE);
        tokio::pin!(deadline);

        let (mut send_open, mut drop_open, mut webhook_open, mut error_open) = (true, true, true, true);

        let result = loop {
            if !send_open && !drop_open && !webhook_open && !error_open {
                break Ok(());
            }

            tokio::select! {
                biased;
                () = &mut deadline => {
                    let _ = channels.cancel.send(());
                    break Err(PipelineError::Processing(Some(Box::new(DeadlineElapsed(DISPATCH_DEADLINE)))));
                }
                maybe = channels.drop.recv(), if drop_open => {
                    match maybe {
                        Some(acked) => {
                            let dropped_rule = acked.value().dropped_rule;
                            acked.ack();
                            info!(session = session_id, dropped_rule, "message dropped");
                            break Ok(());
                        }
                        None => drop_open = false,
                    }
                }
                maybe = channels.send.recv(), if send_open => {
                    match maybe {
                        Some(acked) => {
                            let to = acked.value().to.clone();
                            let outcome = self.forward(session_id, domain, mail_from, rcpt_to, &message, &to).await;
                            acked.ack();
                            if let Err(err) = outcome {
                                break Err(PipelineError::Processing(Some(Box::new(err))));
                            }
                        }
                        None => send_open = false,
                    }
                }
                maybe = channels.webhook.recv(), if webhook_open => {
                    match maybe {
                        Some(acked) => {
                            let event = acked.value().clone();
                            let outcome = self.webhook(session_id, domain, mail_from, rcpt_to, &message, &event.endpoint, &event.secret).await;
                            acked.ack();
                            if let Err(err) = outcome {
                                break Err(PipelineError::Processing(Some(Box::new(err))));
                            }
                        }
                        None => webhook_open = false,
                    }
                }
                maybe = channels.error.recv(), if error_open => {
                    match maybe {
                        Some(acked) => {
                            let err = acked.value().clone();
                            acked.ack();
                            break Err(PipelineError::Processing(Some(Box::new(err))));
                        }
                        None => error_open = false,
                    }
                }
            }
        };

        if result.is_ok() {
            if let Ok(Some(rule_id)) = channels.matched_rule_id.await {
                if let Err(err) = self.maildb.update_status(domain, session_id, MessageStatus::Processed).await {
                    warn!(session = session_id, %err, "maildb update_status(processed) failed");
                }
                if let Err(err) = self.maildb.update_matched_rule(domain, session_id, &rule_id).await {
                    warn!(session = session_id, %err, "maildb update_matched_rule failed");
                }
            }
        }

        result
    }

    async fn forward(
        &self,
        session_id: &str,
        domain: &fwdr_common::Domain,
        mail_from: Option<&str>,
        rcpt_to: &[String],
        message: &Message,
        to: &str,
    ) -> Result<(), fwdr_smtp::ClientError> {
        let headers = outbound::forward_headers(mail_from.unwrap_or(""), rcpt_to, session_id_uuid(session_id), domain, unix_now());
        let full = prepend(&headers, message.raw());
        let target = vec![to.to_string()];
        outbound::submit(self.config.port_mailout, mail_from.unwrap_or(""), &target, &full).await
    }

    async fn webhook(
        &self,
        session_id: &str,
        domain: &fwdr_common::Domain,
        mail_from: Option<&str>,
        rcpt_to: &[String],
        message: &Message,
        endpoint: &str,
        secret: &str,
    ) -> Result<(), fwdr_smtp::ClientError> {
        let headers = outbound::webhook_headers(
            mail_from.unwrap_or(""),
            rcpt_to,
            session_id_uuid(session_id),
            domain,
            unix_now(),
            endpoint,
            secret,
        );
        let full = prepend(&headers, message.raw());
        outbound::submit(self.config.port_webhook, mail_from.unwrap_or(""), rcpt_to, &full).await
    }
}

fn session_id_uuid(session_id: &str) -> uuid::Uuid {
    session_id.parse().unwrap_or(uuid::Uuid::nil())
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn prepend(headers: &str, raw: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(headers.len() + raw.len());
    full.extend_from_slice(headers.as_bytes());
    full.extend_from_slice(raw);
    full
}
