//! Drives one accepted connection through the state machine (§4.5): reads commands, calls
//! the recipient/body handlers, and streams `DATA` bytes into the session's scratch file with
//! RFC 5321 dot-unstuffing.

use std::sync::Arc;

use fwdr_common::error::ProtocolError;
use fwdr_session::Session;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::command::Command;
use crate::connection::Connection;
use crate::handler::{BodyHandler, RecipientHandler};
use crate::state::{SessionCtx, State};
use crate::status::Status;

/// Default message size cap (§4.5): 10 MiB.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct DriverConfig {
    pub hostname: String,
    pub max_message_bytes: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { hostname: "localhost".to_string(), max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES }
    }
}

/// Drives a single connection to completion (`QUIT`, protocol error, or shutdown signal).
pub struct ConnectionDriver<S> {
    conn: Connection<S>,
    config: DriverConfig,
    recipient_handler: Arc<dyn RecipientHandler>,
    body_handler: Arc<dyn BodyHandler>,
}

impl<S> ConnectionDriver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        stream: S,
        config: DriverConfig,
        recipient_handler: Arc<dyn RecipientHandler>,
        body_handler: Arc<dyn BodyHandler>,
    ) -> Self {
        Self { conn: Connection::new(stream), config, recipient_handler, body_handler }
    }

    /// Runs the command loop until `QUIT`, a protocol error, or `shutdown` fires.
    ///
    /// # Errors
    /// Returns the underlying I/O or timeout error if the connection drops unexpectedly.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<fwdr_common::Signal>) -> Result<(), ProtocolError> {
        let mut state = State::default().greet();
        let mut ctx = SessionCtx::default();
        let mut session: Option<Session> = None;

        self.conn.write_reply(&format!("{} {} fwdr ready", Status::ServiceReady.code(), self.config.hostname)).await?;

        loop {
            let line = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    self.conn.write_reply(&format!("{} {} shutting down", Status::Unavailable.code(), self.config.hostname)).await?;
                    return Ok(());
                }
                line = self.conn.read_line() => line?,
            };

            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                continue;
            }

            match Command::try_from(trimmed) {
                Err(Command::Invalid(_)) => {
                    self.conn.write_reply("500 5.5.2 Syntax error, command unrecognized").await?;
                    continue;
                }
                Err(_) => unreachable!("TryFrom<&str> for Command only ever returns Invalid"),
                Ok(Command::RcptTo(addr)) if matches!(state, State::Envelope(_)) => {
                    let accepted = self.recipient_handler.handle_rcpt(&mut session, ctx.mail_from.as_deref(), &addr).await;
                    if accepted {
                        state = state.transition(Command::RcptTo(addr), &mut ctx);
                        self.conn.write_reply(&format!("{} OK", Status::Ok.code())).await?;
                    } else {
                        self.conn.write_reply(&format!("{} 5.1.1 Recipient not accepted", Status::Error.code())).await?;
                    }
                }
                Ok(Command::Data) => {
                    let next = state.transition(Command::Data, &mut ctx);
                    if !matches!(next, State::Data(_)) {
                        self.conn.write_reply(&format!("{} Bad sequence of commands", Status::InvalidCommandSequence.code())).await?;
                        continue;
                    }
                    state = next;
                    self.conn.write_reply(&format!("{} Start mail input; end with <CRLF>.<CRLF>", Status::StartMailInput.code())).await?;

                    let Some(current_session) = session.as_ref() else {
                        warn!("DATA reached with no session allocated; this is a driver bug");
                        self.conn.write_reply("451 4.3.0 Internal server errror").await?;
                        state = state.post_dot_to_ready(&mut ctx);
                        continue;
                    };

                    let body = match self.read_body().await {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            self.conn.write_reply(&err.smtp_reply_for_protocol()).await?;
                            state = state.post_dot_to_ready(&mut ctx);
                            session = None;
                            continue;
                        }
                    };

                    if let Err(err) = current_session.buffer.write(&body).await {
                        warn!(%err, "failed to persist scratch buffer");
                        self.conn.write_reply("451 4.3.0 Internal server errror").await?;
                        state = state.post_dot_to_ready(&mut ctx);
                        session = None;
                        continue;
                    }

                    let result = self.body_handler.handle_body(current_session, ctx.mail_from.as_deref(), &ctx.rcpt_to, body).await;
                    match result {
                        Ok(()) => {
                            info!(session = %current_session.id, "message accepted");
                            self.conn.write_reply(&format!("{} OK id={}", Status::Ok.code(), current_session.id)).await?;
                        }
                        Err(err) => {
                            self.conn.write_reply(&err.smtp_reply()).await?;
                        }
                    }
                    state = state.post_dot_to_ready(&mut ctx);
                    session = None;
                }
                Ok(Command::Rset) => {
                    state = state.transition(Command::Rset, &mut ctx);
                    session = None;
                    self.conn.write_reply(&format!("{} OK", Status::Ok.code())).await?;
                }
                Ok(Command::Quit) => {
                    self.conn.write_reply(&format!("{} {} closing connection", Status::GoodBye.code(), self.config.hostname)).await?;
                    return Ok(());
                }
                Ok(cmd @ (Command::Helo(_) | Command::MailFrom(_) | Command::Noop)) => {
                    let next = state.transition(cmd.clone(), &mut ctx);
                    if next.is_invalid() {
                        self.conn.write_reply(&format!("{} Bad sequence of commands", Status::InvalidCommandSequence.code())).await?;
                    } else if let Command::Helo(variant) = &cmd {
                        self.conn.write_reply(&format!("{} {} Hello {}", Status::Ok.code(), self.config.hostname, variant)).await?;
                    } else {
                        self.conn.write_reply(&format!("{} OK", Status::Ok.code())).await?;
                    }
                    state = next;
                }
                Ok(Command::RcptTo(_)) => {
                    self.conn.write_reply(&format!("{} Bad sequence of commands", Status::InvalidCommandSequence.code())).await?;
                }
            }
        }
    }

    /// Reads `DATA` lines until the terminating `.`, unstuffing leading dots and enforcing
    /// the size cap (§4.5).
    async fn read_body(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        loop {
            let line = self.conn.read_line().await?;
            if line == ".\r\n" || line == ".\n" {
                break;
            }

            let unstuffed = if let Some(rest) = line.strip_prefix('.') { rest } else { line.as_str() };
            if buf.len() + unstuffed.len() > self.config.max_message_bytes {
                return Err(ProtocolError::MessageTooLarge { limit: self.config.max_message_bytes });
            }
            buf.extend_from_slice(unstuffed.as_bytes());
        }
        Ok(buf)
    }
}

trait ProtocolErrorReply {
    fn smtp_reply_for_protocol(&self) -> String;
}

impl ProtocolErrorReply for ProtocolError {
    fn smtp_reply_for_protocol(&self) -> String {
        match self {
            Self::MessageTooLarge { .. } => "552 5.3.4 Message size exceeds fixed maximum".to_string(),
            _ => "451 4.3.0 Internal server errror".to_string(),
        }
    }
}
