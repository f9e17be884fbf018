//! The minimal RFC 5321 command subset this server accepts (§4.5): HELO/EHLO, MAIL FROM,
//! RCPT TO, DATA, RSET, NOOP, QUIT. Parsing is deliberately forgiving of case, matching the
//! way real clients send commands.

use core::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl Display for HeloVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
        })
    }
}

/// A parsed SMTP command line. `MailFrom`'s payload is the raw mailbox text (addresses are
/// resolved later by [`fwdr_common::address`]); `None` denotes the RFC 5321 null sender `<>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo(HeloVariant),
    MailFrom(Option<String>),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    Invalid(String),
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(v) => write!(fmt, "{v}"),
            Self::MailFrom(addr) => write!(fmt, "MAIL FROM:<{}>", addr.as_deref().unwrap_or("")),
            Self::RcptTo(addr) => write!(fmt, "RCPT TO:<{addr}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(s) => fmt.write_str(s),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let upper = trimmed.to_ascii_uppercase();

        if upper.starts_with("MAIL FROM:") {
            let addr = trimmed[10..].trim();
            if addr == "<>" {
                return Ok(Self::MailFrom(None));
            }
            let addr = addr.trim_start_matches('<').trim_end_matches('>').to_string();
            if addr.is_empty() {
                return Err(Self::Invalid(trimmed.to_owned()));
            }
            Ok(Self::MailFrom(Some(addr)))
        } else if upper.starts_with("RCPT TO:") {
            let addr = trimmed[8..].trim();
            let addr = addr.trim_start_matches('<').trim_end_matches('>').to_string();
            if addr.is_empty() {
                return Err(Self::Invalid(trimmed.to_owned()));
            }
            Ok(Self::RcptTo(addr))
        } else if upper.starts_with("EHLO") || upper.starts_with("HELO") {
            match trimmed.split_once(' ') {
                Some((_, host)) if upper.starts_with('E') => Ok(Self::Helo(HeloVariant::Ehlo(host.trim().to_string()))),
                Some((_, host)) => Ok(Self::Helo(HeloVariant::Helo(host.trim().to_string()))),
                None => Err(Self::Invalid(format!("expected hostname in {trimmed}"))),
            }
        } else {
            match upper.as_str() {
                "DATA" => Ok(Self::Data),
                "RSET" => Ok(Self::Rset),
                "NOOP" => Ok(Self::Noop),
                "QUIT" => Ok(Self::Quit),
                _ => Err(Self::Invalid(trimmed.to_owned())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ehlo_and_helo() {
        assert_eq!(Command::try_from("EHLO client.example.com\r\n"), Ok(Command::Helo(HeloVariant::Ehlo("client.example.com".into()))));
        assert_eq!(Command::try_from("helo client.example.com\r\n"), Ok(Command::Helo(HeloVariant::Helo("client.example.com".into()))));
    }

    #[test]
    fn parses_mail_from_with_and_without_null_sender() {
        assert_eq!(Command::try_from("MAIL FROM:<a@example.com>\r\n"), Ok(Command::MailFrom(Some("a@example.com".into()))));
        assert_eq!(Command::try_from("mail from:<>\r\n"), Ok(Command::MailFrom(None)));
    }

    #[test]
    fn parses_rcpt_to() {
        assert_eq!(Command::try_from("RCPT TO:<b@example.com>\r\n"), Ok(Command::RcptTo("b@example.com".into())));
    }

    #[test]
    fn parses_bare_verbs_case_insensitively() {
        assert_eq!(Command::try_from("data\r\n"), Ok(Command::Data));
        assert_eq!(Command::try_from("RSET\r\n"), Ok(Command::Rset));
        assert_eq!(Command::try_from("NoOp\r\n"), Ok(Command::Noop));
        assert_eq!(Command::try_from("QUIT\r\n"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Command::try_from("FROBNICATE\r\n"), Err(Command::Invalid(_))));
        assert!(matches!(Command::try_from("EHLO\r\n"), Err(Command::Invalid(_))));
        assert!(matches!(Command::try_from("RCPT TO:<>\r\n"), Err(Command::Invalid(_))));
    }
}
