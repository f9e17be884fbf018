use mailparse::{parse_headers, MailHeader, MailParseError};

/// The original, byte-exact on-wire message plus its parsed header view (§3).
///
/// The raw bytes are immutable after receipt and are the canonical form forwarded
/// downstream; `headers` is derived and may be rebuilt by re-parsing `raw`.
#[derive(Debug, Clone)]
pub struct Message {
    raw: Vec<u8>,
    headers: Vec<MailHeaderOwned>,
}

#[derive(Debug, Clone)]
struct MailHeaderOwned {
    key: String,
    value: String,
}

impl Message {
    /// Parses RFC 5322 headers out of `raw`, leaving the body untouched.
    ///
    /// # Errors
    /// Returns an error if the header block is malformed.
    pub fn parse(raw: Vec<u8>) -> Result<Self, MailParseError> {
        let (headers, _body_offset) = parse_headers(&raw)?;
        let headers = headers.iter().map(owned).collect();
        Ok(Self { raw, headers })
    }

    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The first value of `name`, case-insensitively, or `None` if absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Every value of `name`, in header order.
    #[must_use]
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.key.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    /// True if `name` appears at least once, regardless of value (used for the empty
    /// `Subject:` case in §4.2's field-extraction rule).
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.key.eq_ignore_ascii_case(name))
    }

    /// Count of `Received` headers, used by loop detection (§4.7 step 6).
    #[must_use]
    pub fn received_count(&self) -> usize {
        self.header_all("Received").len()
    }
}

fn owned(header: &MailHeader<'_>) -> MailHeaderOwned {
    MailHeaderOwned {
        key: header.get_key(),
        value: header.get_value(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &[u8] = b"From: a@b.com\r\nTo: c@d.com\r\nSubject: hi\r\nReceived: x\r\nReceived: y\r\n\r\nbody\r\n";

    #[test]
    fn parses_headers_and_preserves_raw_bytes() {
        let message = Message::parse(FIXTURE.to_vec()).unwrap();
        assert_eq!(message.header("from"), Some("a@b.com"));
        assert_eq!(message.header("To"), Some("c@d.com"));
        assert_eq!(message.raw(), FIXTURE);
    }

    #[test]
    fn counts_received_headers_for_loop_detection() {
        let message = Message::parse(FIXTURE.to_vec()).unwrap();
        assert_eq!(message.received_count(), 2);
    }

    #[test]
    fn empty_subject_header_is_present_but_empty() {
        let raw = b"Subject:\r\n\r\nbody".to_vec();
        let message = Message::parse(raw).unwrap();
        assert!(message.has_header("Subject"));
        assert_eq!(message.header("Subject"), Some(""));
    }

    #[test]
    fn missing_header_returns_none() {
        let message = Message::parse(FIXTURE.to_vec()).unwrap();
        assert_eq!(message.header("X-Spam-Status"), None);
    }
}
