//! The per-connection type-state machine (§4.5): each state is a zero-sized marker struct,
//! wrapped in the [`State`] enum for storage, so illegal command/state pairs are
//! unrepresentable by construction. Mutable per-connection data (the HELO id, the envelope
//! being built) lives in [`SessionCtx`], threaded through every [`State::transition`] call —
//! matching the teacher's `Context`-plus-marker-struct split.

use core::fmt::{self, Display, Formatter};

use crate::command::{Command, HeloVariant};

mod sealed {
    pub trait Sealed {}
}

pub trait SmtpState: sealed::Sealed + core::fmt::Debug {}

macro_rules! marker {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;
        impl sealed::Sealed for $name {}
        impl SmtpState for $name {}
    };
}

marker!(Connect);
marker!(Greeted);
marker!(Ready);
marker!(Envelope);
marker!(Data);
marker!(PostDot);
marker!(Quit);
marker!(Invalid);

/// Mutable state threaded through transitions: the HELO identity and the envelope under
/// construction (§3's `Session`/envelope data model, minus anything allocated only once a
/// session exists).
#[derive(Debug, Default)]
pub struct SessionCtx {
    pub extended: bool,
    pub helo_id: Option<String>,
    pub mail_from: Option<String>,
    pub rcpt_to: Vec<String>,
    pub last_error: Option<String>,
}

impl SessionCtx {
    /// Clears transaction state on RSET or after a completed DATA (§4.5), keeping the HELO
    /// identity.
    pub fn reset_transaction(&mut self) {
        self.mail_from = None;
        self.rcpt_to.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connect(Connect),
    Greeted(Greeted),
    Ready(Ready),
    Envelope(Envelope),
    Data(Data),
    PostDot(PostDot),
    Quit(Quit),
    Invalid(Invalid),
}

impl Default for State {
    fn default() -> Self {
        Self::Connect(Connect)
    }
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Connect(_) => "CONNECT",
            Self::Greeted(_) => "GREETED",
            Self::Ready(_) => "READY",
            Self::Envelope(_) => "ENVELOPE",
            Self::Data(_) => "DATA",
            Self::PostDot(_) => "POSTDOT",
            Self::Quit(_) => "QUIT",
            Self::Invalid(_) => "INVALID",
        })
    }
}

impl State {
    /// The server writes its banner immediately after accepting the connection (§4.5); this
    /// is not client-driven so it is not part of `transition`.
    #[must_use]
    pub const fn greet(self) -> Self {
        match self {
            Self::Connect(_) => Self::Greeted(Greeted),
            other => other,
        }
    }

    /// Applies one parsed command to the current state, per the accept table in §4.5.
    #[must_use]
    pub fn transition(self, command: Command, ctx: &mut SessionCtx) -> Self {
        match (self, command) {
            (Self::Greeted(_), Command::Helo(HeloVariant::Ehlo(id))) => {
                ctx.extended = true;
                ctx.helo_id = Some(id);
                Self::Ready(Ready)
            }
            (Self::Greeted(_), Command::Helo(HeloVariant::Helo(id))) => {
                ctx.extended = false;
                ctx.helo_id = Some(id);
                Self::Ready(Ready)
            }
            (Self::Greeted(_), Command::Noop) => Self::Greeted(Greeted),
            (Self::Ready(_), Command::Noop) => Self::Ready(Ready),
            (Self::Envelope(_), Command::Noop) => Self::Envelope(Envelope),
            (Self::Ready(_), Command::MailFrom(sender)) => {
                ctx.mail_from = sender;
                Self::Envelope(Envelope)
            }
            (Self::Envelope(_), Command::RcptTo(rcpt)) => {
                ctx.rcpt_to.push(rcpt);
                Self::Envelope(Envelope)
            }
            (Self::Envelope(_), Command::Data) if !ctx.rcpt_to.is_empty() => Self::Data(Data),
            (Self::Ready(_) | Self::Envelope(_), Command::Rset) => {
                ctx.reset_transaction();
                Self::Ready(Ready)
            }
            (_, Command::Quit) => Self::Quit(Quit),
            (Self::Invalid(_), _) => Self::Invalid(Invalid),
            (state, command) => {
                ctx.last_error = Some(format!("unexpected {command} in state {state}"));
                Self::Invalid(Invalid)
            }
        }
    }

    /// After the `DATA` terminator, the handler has run; the connection returns to `Ready`
    /// for a possible second transaction on the same connection (§4.5, §4.7).
    #[must_use]
    pub fn post_dot_to_ready(self, ctx: &mut SessionCtx) -> Self {
        match self {
            Self::Data(_) => {
                ctx.reset_transaction();
                Self::Ready(Ready)
            }
            other => other,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Quit(_))
    }

    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_then_greet_then_helo_reaches_ready() {
        let mut ctx = SessionCtx::default();
        let state = State::default().greet();
        assert_eq!(state, State::Greeted(Greeted));

        let state = state.transition(Command::Helo(HeloVariant::Ehlo("client".into())), &mut ctx);
        assert_eq!(state, State::Ready(Ready));
        assert!(ctx.extended);
        assert_eq!(ctx.helo_id.as_deref(), Some("client"));
    }

    #[test]
    fn full_happy_path_transaction() {
        let mut ctx = SessionCtx::default();
        let state = State::default().greet();
        let state = state.transition(Command::Helo(HeloVariant::Helo("client".into())), &mut ctx);
        let state = state.transition(Command::MailFrom(Some("a@example.com".into())), &mut ctx);
        assert_eq!(state, State::Envelope(Envelope));

        let state = state.transition(Command::RcptTo("b@example.com".into()), &mut ctx);
        assert_eq!(state, State::Envelope(Envelope));
        assert_eq!(ctx.rcpt_to, vec!["b@example.com".to_string()]);

        let state = state.transition(Command::Data, &mut ctx);
        assert_eq!(state, State::Data(Data));

        let state = state.post_dot_to_ready(&mut ctx);
        assert_eq!(state, State::Ready(Ready));
        assert!(ctx.mail_from.is_none());
        assert!(ctx.rcpt_to.is_empty());
    }

    #[test]
    fn data_without_any_rcpt_is_rejected() {
        let mut ctx = SessionCtx::default();
        let state = State::Envelope(Envelope);
        let state = state.transition(Command::Data, &mut ctx);
        assert!(state.is_invalid());
    }

    #[test]
    fn rset_from_envelope_clears_transaction_and_returns_to_ready() {
        let mut ctx = SessionCtx { mail_from: Some("a@example.com".into()), rcpt_to: vec!["b@example.com".into()], ..Default::default() };
        let state = State::Envelope(Envelope).transition(Command::Rset, &mut ctx);
        assert_eq!(state, State::Ready(Ready));
        assert!(ctx.mail_from.is_none());
        assert!(ctx.rcpt_to.is_empty());
    }

    #[test]
    fn quit_is_accepted_from_any_state() {
        let mut ctx = SessionCtx::default();
        for state in [State::Greeted(Greeted), State::Ready(Ready), State::Envelope(Envelope)] {
            assert_eq!(state.transition(Command::Quit, &mut ctx), State::Quit(Quit));
        }
    }

    #[test]
    fn mail_from_before_helo_is_invalid() {
        let mut ctx = SessionCtx::default();
        let state = State::Greeted(Greeted).transition(Command::MailFrom(Some("a@example.com".into())), &mut ctx);
        assert!(state.is_invalid());
        assert!(ctx.last_error.is_some());
    }

    #[test]
    fn invalid_state_is_sticky() {
        let mut ctx = SessionCtx::default();
        let state = State::Invalid(Invalid).transition(Command::Noop, &mut ctx);
        assert!(state.is_invalid());
    }
}
