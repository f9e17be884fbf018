/// The SMTP-level `MAIL FROM` / `RCPT TO` tuple, distinct from header-level `From:`/`To:`
/// (§3, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    from: Option<String>,
    to: Vec<String>,
}

impl Envelope {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            from: None,
            to: Vec::new(),
        }
    }

    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn set_from(&mut self, from: String) {
        self.from = Some(from);
    }

    #[must_use]
    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn add_recipient(&mut self, recipient: String) {
        self.to.push(recipient);
    }

    pub fn reset(&mut self) {
        self.from = None;
        self.to.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_both_sides() {
        let mut envelope = Envelope::new();
        envelope.set_from("a@b.com".to_string());
        envelope.add_recipient("c@d.com".to_string());
        envelope.reset();
        assert!(envelope.is_empty());
        assert_eq!(envelope.to(), &[] as &[String]);
    }

    #[test]
    fn accumulates_multiple_recipients_in_order() {
        let mut envelope = Envelope::new();
        envelope.add_recipient("a@b.com".to_string());
        envelope.add_recipient("c@d.com".to_string());
        assert_eq!(envelope.to(), &["a@b.com".to_string(), "c@d.com".to_string()]);
    }
}
