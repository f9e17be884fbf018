//! Drives a full connection over a real loopback socket (§4.5), exercising the happy path
//! and a couple of rejection paths through [`fwdr_smtp::Listener`] against fake handlers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fwdr_common::config::Config;
use fwdr_common::domain::{DomainRecord, DomainStatus};
use fwdr_common::error::PipelineError;
use fwdr_common::{Domain, Signal};
use fwdr_session::Session;
use fwdr_smtp::{BodyHandler, Listener, RecipientHandler};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

struct FakeHandler {
    accept_recipients: bool,
    accepted_bodies: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl RecipientHandler for FakeHandler {
    async fn handle_rcpt(&self, session: &mut Option<Session>, _mail_from: Option<&str>, rcpt_to: &str) -> bool {
        if !self.accept_recipients {
            return false;
        }
        if session.is_none() {
            let domain = DomainRecord { name: Domain::from(rcpt_to.rsplit_once('@').map_or(rcpt_to, |(_, d)| d)), status: DomainStatus::Active };
            let config = Arc::new(Config { root: std::env::temp_dir(), ..Config::default() });
            *session = Some(Session::new(domain, config));
        }
        true
    }
}

#[async_trait]
impl BodyHandler for FakeHandler {
    async fn handle_body(&self, _session: &Session, _mail_from: Option<&str>, _rcpt_to: &[String], raw: Vec<u8>) -> Result<(), PipelineError> {
        self.accepted_bodies.lock().unwrap().push(raw);
        Ok(())
    }
}

async fn read_reply(stream: &mut TcpStream) -> String {
    use tokio::io::AsyncReadExt;
    let mut buf = vec![0u8; 1024];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await.unwrap().unwrap();
    String::from_utf8_lossy(&buf[..n]).to_string()
}

/// Grabs a free ephemeral port by binding synchronously and releasing it immediately, so the
/// async `Listener` can rebind it a moment later (§4.5's listener owns its own bind).
async fn reserve_port() -> std::net::SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn write_line(stream: &mut TcpStream, line: &str) {
    use tokio::io::AsyncWriteExt;
    stream.write_all(line.as_bytes()).await.unwrap();
    stream.write_all(b"\r\n").await.unwrap();
}

#[tokio::test]
async fn accepts_a_full_transaction_and_runs_the_body_handler() {
    let handler = Arc::new(FakeHandler { accept_recipients: true, accepted_bodies: Mutex::new(Vec::new()) });
    let addr = reserve_port().await;
    let listener = Listener::new(addr, "test.local".to_string(), handler.clone(), handler.clone());

    let (shutdown_tx, _) = broadcast::channel(1);
    let serve_shutdown = shutdown_tx.clone();
    let server = tokio::spawn(async move { listener.serve(serve_shutdown).await });

    // give the accept loop a moment to bind
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    assert!(read_reply(&mut stream).await.starts_with("220"));

    write_line(&mut stream, "EHLO client.example").await;
    assert!(read_reply(&mut stream).await.starts_with("250"));

    write_line(&mut stream, "MAIL FROM:<a@example.com>").await;
    assert!(read_reply(&mut stream).await.starts_with("250"));

    write_line(&mut stream, "RCPT TO:<b@example.com>").await;
    assert!(read_reply(&mut stream).await.starts_with("250"));

    write_line(&mut stream, "DATA").await;
    assert!(read_reply(&mut stream).await.starts_with("354"));

    write_line(&mut stream, "Subject: hi").await;
    write_line(&mut stream, "").await;
    write_line(&mut stream, "body text").await;
    write_line(&mut stream, ".").await;
    assert!(read_reply(&mut stream).await.starts_with("250"));

    write_line(&mut stream, "QUIT").await;
    assert!(read_reply(&mut stream).await.starts_with("221"));

    let _ = shutdown_tx.send(Signal::Shutdown);
    server.await.unwrap().unwrap();

    let bodies = handler.accepted_bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert!(String::from_utf8_lossy(&bodies[0]).contains("body text"));
}

#[tokio::test]
async fn rejected_recipient_gets_550_and_data_out_of_sequence_is_refused() {
    let handler = Arc::new(FakeHandler { accept_recipients: false, accepted_bodies: Mutex::new(Vec::new()) });
    let addr = reserve_port().await;
    let listener = Listener::new(addr, "test.local".to_string(), handler.clone(), handler);

    let (shutdown_tx, _) = broadcast::channel(1);
    let serve_shutdown = shutdown_tx.clone();
    let server = tokio::spawn(async move { listener.serve(serve_shutdown).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let _ = read_reply(&mut stream).await;

    write_line(&mut stream, "EHLO client.example").await;
    let _ = read_reply(&mut stream).await;

    write_line(&mut stream, "MAIL FROM:<a@example.com>").await;
    let _ = read_reply(&mut stream).await;

    write_line(&mut stream, "RCPT TO:<b@example.com>").await;
    assert!(read_reply(&mut stream).await.starts_with("550"));

    write_line(&mut stream, "DATA").await;
    assert!(read_reply(&mut stream).await.starts_with("503"));

    write_line(&mut stream, "QUIT").await;
    let _ = read_reply(&mut stream).await;

    let _ = shutdown_tx.send(Signal::Shutdown);
    server.await.unwrap().unwrap();
}
