use fwdr_common::{address, Envelope, Message};

use crate::types::Field;

/// Produces the candidate strings a predicate tests against, per §4.2's field-extraction
/// rules. `to`/`from` prefer the parsed header and fall back to the envelope; `subject`
/// always comes from the header, including the empty string when present but empty.
///
/// # Errors
/// Returns an error only when both the header and the envelope fallback fail to parse as an
/// address (the `to`/`from` case) — `subject` extraction never fails.
pub fn extract(field: Field, message: &Message, envelope: &Envelope) -> Result<Vec<String>, String> {
    match field {
        Field::To => extract_address_field(message, envelope, "To", envelope.to().first().map(String::as_str)),
        Field::From => extract_address_field(message, envelope, "From", envelope.from()),
        Field::Subject => Ok(vec![message.header("Subject").unwrap_or_default().to_string()]),
    }
}

fn extract_address_field(
    message: &Message,
    _envelope: &Envelope,
    header_name: &str,
    envelope_fallback: Option<&str>,
) -> Result<Vec<String>, String> {
    if let Some(header_value) = message.header(header_name) {
        if let Some(mailboxes) = address::mailboxes_from_header(header_value) {
            return Ok(mailboxes);
        }
    }

    let fallback = envelope_fallback.ok_or_else(|| format!("no envelope fallback for {header_name}"))?;
    let mailbox = address::mailbox_from_envelope(fallback).map_err(|e| e.to_string())?;
    Ok(vec![mailbox])
}
