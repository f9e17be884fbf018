//! The bundle of four typed channels through which the rule-engine worker streams its
//! decisions back to the SMTP body handler, and the worker itself (§4.3).

use std::sync::Arc;

use fwdr_common::envelope::Envelope;
use fwdr_common::error::RuleEvalError;
use fwdr_common::message::Message;
use fwdr_rules::{Event as RuleEvent, Rule};
use tokio::sync::{mpsc, oneshot};

/// A forward event: submit the message to `to` (§3's `FORWARD`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEvent {
    pub to: String,
}

/// The terminal drop event. `dropped_rule` is true when a matched rule's own `DROP` action
/// fired it; false for the default no-match outcome (§8's default-drop invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropEvent {
    pub dropped_rule: bool,
}

/// A webhook dispatch event (§3's `WEBHOOK`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub endpoint: String,
    pub secret: String,
}

/// Wraps an event with a one-shot acknowledgement the handler must fire once it has
/// realized the corresponding side effect. The engine awaits this ack before emitting its
/// next event, which is what makes each channel a rendezvous rather than merely buffered
/// (§4.3, §9).
#[derive(Debug)]
pub struct Acked<T> {
    value: T,
    ack_tx: oneshot::Sender<()>,
}

impl<T> Acked<T> {
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Signals the engine that this event's side effect has been realized, unblocking its
    /// next send.
    pub fn ack(self) {
        let _ = self.ack_tx.send(());
    }
}

/// The consumer half of the action channel set, held by the SMTP body handler (§4.3).
pub struct ActionChannels {
    pub send: mpsc::Receiver<Acked<SendEvent>>,
    pub drop: mpsc::Receiver<Acked<DropEvent>>,
    pub webhook: mpsc::Receiver<Acked<WebhookEvent>>,
    pub error: mpsc::Receiver<Acked<RuleEvalError>>,
    /// Fired by the handler on deadline expiry to end the worker task (§4.7 step 8,
    /// §5 "Cancellation").
    pub cancel: oneshot::Sender<()>,
    /// Resolves to the id of the rule that matched (`None` for the default-drop outcome),
    /// sent by the worker right after it evaluates the rule list and before it starts
    /// streaming events. The handler awaits this once dispatch completes, to know what to
    /// record via maildb (§4.7 step 8) — kept out of this crate's own dependencies so the
    /// channel-mediated core stays decoupled from the maildb HTTP client.
    pub matched_rule_id: oneshot::Receiver<Option<String>>,
}

struct ActionSenders {
    send: mpsc::Sender<Acked<SendEvent>>,
    drop: mpsc::Sender<Acked<DropEvent>>,
    webhook: mpsc::Sender<Acked<WebhookEvent>>,
    error: mpsc::Sender<Acked<RuleEvalError>>,
}

fn bundle() -> (ActionSenders, mpsc::Receiver<Acked<SendEvent>>, mpsc::Receiver<Acked<DropEvent>>, mpsc::Receiver<Acked<WebhookEvent>>, mpsc::Receiver<Acked<RuleEvalError>>) {
    let (send_tx, send_rx) = mpsc::channel(1);
    let (drop_tx, drop_rx) = mpsc::channel(1);
    let (webhook_tx, webhook_rx) = mpsc::channel(1);
    let (error_tx, error_rx) = mpsc::channel(1);

    (
        ActionSenders { send: send_tx, drop: drop_tx, webhook: webhook_tx, error: error_tx },
        send_rx,
        drop_rx,
        webhook_rx,
        error_rx,
    )
}

/// Spawns the rule-engine worker task and returns the handler-side `ActionChannels`.
///
/// The worker evaluates `rules` once (a pure, deterministic step — §8's rule-order-
/// determinism invariant), then streams the resulting events one rendezvous at a time,
/// awaiting each `Acked::ack` before proceeding. It ends — dropping every `Sender`, which
/// closes the channel set by ordinary RAII (§4.3) — after a terminal event (`drop`/`error`)
/// or cancellation, or once every event has been delivered.
pub fn spawn(rules: Vec<Rule>, message: Arc<Message>, envelope: Envelope) -> ActionChannels {
    let (senders, send_rx, drop_rx, webhook_rx, error_rx) = bundle();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let (matched_tx, matched_rx) = oneshot::channel();

    tokio::spawn(run_worker(rules, message, envelope, senders, cancel_rx, matched_tx));

    ActionChannels {
        send: send_rx,
        drop: drop_rx,
        webhook: webhook_rx,
        error: error_rx,
        cancel: cancel_tx,
        matched_rule_id: matched_rx,
    }
}

async fn run_worker(
    rules: Vec<Rule>,
    message: Arc<Message>,
    envelope: Envelope,
    senders: ActionSenders,
    mut cancel_rx: oneshot::Receiver<()>,
    matched_tx: oneshot::Sender<Option<String>>,
) {
    let outcome = fwdr_rules::evaluate(&rules, &message, &envelope);
    let _ = matched_tx.send(outcome.matched_rule_id);

    for event in outcome.events {
        let (ack_tx, ack_rx) = oneshot::channel();

        let delivered = tokio::select! {
            biased;
            _ = &mut cancel_rx => false,
            result = deliver(&senders, event, ack_tx) => result,
        };

        if !delivered {
            tracing::debug!("rule engine worker cancelled before delivering an event");
            return;
        }

        tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                tracing::debug!("rule engine worker cancelled while awaiting ack");
                return;
            }
            _ = ack_rx => {}
        }
    }
}

async fn deliver(senders: &ActionSenders, event: RuleEvent, ack_tx: oneshot::Sender<()>) -> bool {
    match event {
        RuleEvent::Send { to } => senders.send.send(Acked { value: SendEvent { to }, ack_tx }).await.is_ok(),
        RuleEvent::Drop { dropped_rule } => {
            senders.drop.send(Acked { value: DropEvent { dropped_rule }, ack_tx }).await.is_ok()
        }
        RuleEvent::Webhook { endpoint, secret } => senders
            .webhook
            .send(Acked { value: WebhookEvent { endpoint, secret }, ack_tx })
            .await
            .is_ok(),
        RuleEvent::Error(err) => senders.error.send(Acked { value: err, ack_tx }).await.is_ok(),
    }
}
