use mailparse::{addrparse, MailAddr};

/// Extracts the mailbox part (`local@domain`) from every address in `header_value`,
/// discarding display names, per §4.2's "mailbox part only" field-extraction rule.
///
/// Returns `None` if the header does not parse as an address list, or parses to zero
/// addresses, so the caller can fall back to the envelope.
#[must_use]
pub fn mailboxes_from_header(header_value: &str) -> Option<Vec<String>> {
    let parsed = addrparse(header_value).ok()?;
    let mailboxes: Vec<String> = parsed.iter().flat_map(flatten_mailboxes).collect();

    if mailboxes.is_empty() {
        None
    } else {
        Some(mailboxes)
    }
}

fn flatten_mailboxes(addr: &MailAddr) -> Vec<String> {
    match addr {
        MailAddr::Single(info) => vec![info.addr.clone()],
        MailAddr::Group(group) => group.addrs.iter().map(|info| info.addr.clone()).collect(),
    }
}

/// Parses a single envelope address string (e.g. the raw `MAIL FROM`/`RCPT TO` value) into
/// its mailbox part, used as the fallback when a header is absent or malformed.
///
/// # Errors
/// Returns an error if `value` is not a syntactically valid RFC 5322 address.
pub fn mailbox_from_envelope(value: &str) -> Result<String, mailparse::MailParseError> {
    let parsed = addrparse(value)?;
    let mailboxes: Vec<String> = parsed.iter().flat_map(flatten_mailboxes).collect();
    mailboxes
        .into_iter()
        .next()
        .ok_or(mailparse::MailParseError::Generic("no address found"))
}
