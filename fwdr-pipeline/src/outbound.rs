//! Forward and webhook hops (§6): both submit via SMTP to a loopback relay, differing only
//! in destination port and the headers prepended to the original bytes. The original bytes
//! are never otherwise touched, preserving any downstream signature (§1 Non-goals).

use fwdr_smtp::client::{ClientError, SmtpClient};
use uuid::Uuid;

/// Builds the `Mw-Int-*` header block prepended before the original message bytes on the
/// forward path (§6). `rcpt_to` uses only the first recipient, per the original design.
#[must_use]
pub fn forward_headers(mail_from: &str, rcpt_to: &[String], session_id: Uuid, domain: &str, unix_seconds: i64) -> String {
    let first_rcpt = rcpt_to.first().map_or("", String::as_str);
    format!(
        "Mw-Int-Mail-From: {mail_from}\r\n\
         Mw-Int-Rcpt-To: {first_rcpt}\r\n\
         Mw-Int-Id: {session_id}\r\n\
         Mw-Int-Domain: {domain}\r\n\
         Mw-Int-Date: {unix_seconds}\r\n\
         Mw-Int-Via: forwarding\r\n"
    )
}

/// As [`forward_headers`], with the additional webhook-destination headers (§6).
#[must_use]
pub fn webhook_headers(mail_from: &str, rcpt_to: &[String], session_id: Uuid, domain: &str, unix_seconds: i64, endpoint: &str, secret: &str) -> String {
    let mut headers = forward_headers(mail_from, rcpt_to, session_id, domain, unix_seconds);
    headers.push_str(&format!("Mw-Int-Webhook-URL: {endpoint}\r\nMw-Int-Webhook-Secret-Token: {secret}\r\n"));
    headers
}

/// Submits `raw` (header block already prepended by the caller) to a loopback SMTP relay on
/// `port`, as `mail_from` → `rcpt_to` (§6).
///
/// # Errors
/// Returns [`ClientError`] if any step of the transaction is rejected or times out.
pub async fn submit(port: u16, mail_from: &str, rcpt_to: &[String], raw: &[u8]) -> Result<(), ClientError> {
    let mut client = SmtpClient::connect(&format!("127.0.0.1:{port}")).await?;
    client.ehlo("fwdr").await?;
    client.mail_from(mail_from).await?;
    for rcpt in rcpt_to {
        client.rcpt_to(rcpt).await?;
    }
    client.data(raw).await?;
    let _ = client.quit().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_headers_use_only_the_first_recipient() {
        let id = Uuid::nil();
        let headers = forward_headers("a@b.com", &["c@d.com".to_string(), "e@f.com".to_string()], id, "d.com", 1_700_000_000);
        assert!(headers.contains("Mw-Int-Mail-From: a@b.com\r\n"));
        assert!(headers.contains("Mw-Int-Rcpt-To: c@d.com\r\n"));
        assert!(!headers.contains("e@f.com"));
        assert!(headers.contains("Mw-Int-Via: forwarding\r\n"));
    }

    #[test]
    fn webhook_headers_extend_forward_headers() {
        let id = Uuid::nil();
        let headers = webhook_headers("a@b.com", &["c@d.com".to_string()], id, "d.com", 1_700_000_000, "https://example.com/hook", "shh");
        assert!(headers.contains("Mw-Int-Webhook-URL: https://example.com/hook\r\n"));
        assert!(headers.contains("Mw-Int-Webhook-Secret-Token: shh\r\n"));
        assert!(headers.contains("Mw-Int-Mail-From: a@b.com\r\n"));
    }
}
