//! Buffered line I/O over a plain TCP stream, with the 5-minute read timeout from §4.5.
//! TLS is out of scope for this rebuild (§10.5), so unlike the teacher's `Connection` enum
//! this only ever wraps a plain stream.

use std::time::Duration;

use fwdr_common::error::ProtocolError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const LINE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub struct Connection<S> {
    reader: BufReader<S>,
}

impl<S> Connection<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { reader: BufReader::new(stream) }
    }

    /// Reads one CRLF-terminated line, timing out after 5 minutes of inactivity (§4.5).
    ///
    /// # Errors
    /// Returns [`ProtocolError::ConnectionClosed`] on EOF, [`ProtocolError::Io`] on a read
    /// error or timeout.
    pub async fn read_line(&mut self) -> Result<String, ProtocolError> {
        let mut line = String::new();
        let read = tokio::time::timeout(LINE_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .map_err(|_| ProtocolError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "line read timed out")))??;

        if read == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        Ok(line)
    }

    /// Writes a reply line, appending the trailing CRLF.
    ///
    /// # Errors
    /// Propagates the underlying write error.
    pub async fn write_reply(&mut self, line: &str) -> std::io::Result<()> {
        self.reader.get_mut().write_all(line.as_bytes()).await?;
        self.reader.get_mut().write_all(b"\r\n").await?;
        self.reader.get_mut().flush().await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncReadExt};

    use super::*;

    #[tokio::test]
    async fn read_line_strips_nothing_and_returns_the_raw_line() {
        let (mut client, server) = duplex(64);
        client.write_all(b"EHLO foo\r\n").await.unwrap();
        let mut conn = Connection::new(server);
        let line = conn.read_line().await.unwrap();
        assert_eq!(line, "EHLO foo\r\n");
    }

    #[tokio::test]
    async fn read_line_on_closed_stream_is_connection_closed() {
        let (client, server) = duplex(64);
        drop(client);
        let mut conn = Connection::new(server);
        assert!(matches!(conn.read_line().await, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn write_reply_appends_crlf() {
        let (mut client, server) = duplex(64);
        let mut conn = Connection::new(server);
        conn.write_reply("250 OK").await.unwrap();
        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"250 OK\r\n");
    }
}
