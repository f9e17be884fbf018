//! Outbound SMTP submission to the loopback forward/webhook hops (§6): connect, `EHLO`,
//! `MAIL FROM`, `RCPT TO`, `DATA`, `QUIT`. TLS negotiation is out of scope for this rebuild
//! (§10.5), so this is the teacher's transaction shape with the `STARTTLS` step removed.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Response {
    pub code: u16,
    pub message: String,
}

impl Response {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code < 400
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("outbound command timed out")]
    Timeout,

    #[error("malformed SMTP reply: {0}")]
    MalformedReply(String),

    #[error("server rejected {command}: {}", response.message)]
    Rejected { command: &'static str, response: Response },
}

/// A minimal outbound SMTP client for one delivery transaction, reused by the
/// forward and webhook hops (§6).
pub struct SmtpClient {
    reader: BufReader<TcpStream>,
}

impl SmtpClient {
    /// Connects and reads the server greeting.
    ///
    /// # Errors
    /// Returns [`ClientError::Io`] on connect failure, [`ClientError::Rejected`] if the
    /// greeting is not a `2xx`.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(COMMAND_TIMEOUT, TcpStream::connect(addr)).await.map_err(|_| ClientError::Timeout)??;
        let mut client = Self { reader: BufReader::new(stream) };
        let greeting = client.read_response().await?;
        if !greeting.is_success() {
            return Err(ClientError::Rejected { command: "CONNECT", response: greeting });
        }
        Ok(client)
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ClientError> {
        let stream = self.reader.get_mut();
        tokio::time::timeout(COMMAND_TIMEOUT, async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ClientError::Timeout)??;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Response, ClientError> {
        let mut code = None;
        let mut message = String::new();
        loop {
            let mut line = String::new();
            tokio::time::timeout(COMMAND_TIMEOUT, self.reader.read_line(&mut line)).await.map_err(|_| ClientError::Timeout)??;
            if line.len() < 4 {
                return Err(ClientError::MalformedReply(line));
            }
            let line_code: u16 = line[..3].parse().map_err(|_| ClientError::MalformedReply(line.clone()))?;
            code.get_or_insert(line_code);
            message.push_str(line[4..].trim_end());
            let is_final = line.as_bytes().get(3) == Some(&b' ');
            if is_final {
                break;
            }
            message.push('\n');
        }
        Ok(Response { code: code.unwrap_or(0), message })
    }

    async fn command(&mut self, command: &'static str, line: &str) -> Result<Response, ClientError> {
        self.write_line(line).await?;
        let response = self.read_response().await?;
        if !response.is_success() {
            return Err(ClientError::Rejected { command, response });
        }
        Ok(response)
    }

    /// # Errors
    /// Returns [`ClientError::Rejected`] if the server declines the identity.
    pub async fn ehlo(&mut self, id: &str) -> Result<Response, ClientError> {
        self.command("EHLO", &format!("EHLO {id}")).await
    }

    /// # Errors
    /// Returns [`ClientError::Rejected`] if the server declines the sender.
    pub async fn mail_from(&mut self, sender: &str) -> Result<Response, ClientError> {
        self.command("MAIL FROM", &format!("MAIL FROM:<{sender}>")).await
    }

    /// # Errors
    /// Returns [`ClientError::Rejected`] if the server declines the recipient.
    pub async fn rcpt_to(&mut self, recipient: &str) -> Result<Response, ClientError> {
        self.command("RCPT TO", &format!("RCPT TO:<{recipient}>")).await
    }

    /// Sends `DATA`, the (dot-stuffed) message bytes, and the terminating `.`.
    ///
    /// # Errors
    /// Returns [`ClientError::Rejected`] if the server declines the data phase or the
    /// message itself.
    pub async fn data(&mut self, raw: &[u8]) -> Result<Response, ClientError> {
        self.command("DATA", "DATA").await?;

        let stream = self.reader.get_mut();
        tokio::time::timeout(COMMAND_TIMEOUT, async {
            for line in raw.split_inclusive(|&b| b == b'\n') {
                if line.first() == Some(&b'.') {
                    stream.write_all(b".").await?;
                }
                stream.write_all(line).await?;
            }
            if !raw.ends_with(b"\n") {
                stream.write_all(b"\r\n").await?;
            }
            stream.write_all(b".\r\n").await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ClientError::Timeout)??;

        let response = self.read_response().await?;
        if !response.is_success() {
            return Err(ClientError::Rejected { command: "DATA", response });
        }
        Ok(response)
    }

    /// Best-effort: delivery is already complete by the time `QUIT` is sent, so a failure
    /// here is logged by the caller, not propagated as a delivery failure.
    ///
    /// # Errors
    /// Returns the underlying I/O or timeout error.
    pub async fn quit(&mut self) -> Result<Response, ClientError> {
        self.command("QUIT", "QUIT").await
    }
}
