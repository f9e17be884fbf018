use fwdr_common::error::RuleEvalError;
use fwdr_common::{Envelope, Message};

use crate::fields;
use crate::glob;
use crate::types::{Action, Field, Predicate, Rule};

/// One unit of engine output, emitted in declared order (§4.2, §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Send { to: String },
    Drop { dropped_rule: bool },
    Webhook { endpoint: String, secret: String },
    Error(RuleEvalError),
}

/// The result of evaluating a rule list against one message: the ordered events to emit,
/// and the id of the rule that matched (`None` for the default-drop outcome).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub events: Vec<Event>,
    pub matched_rule_id: Option<String>,
}

/// Evaluates `rules` against `message`/`envelope` in list order and returns the full,
/// ordered event sequence a real dispatcher would stream one rendezvous at a time (§4.2).
///
/// This is a pure function: given the same rules and message, it always produces the same
/// event sequence (§8's rule-order-determinism invariant) — the dispatcher (`fwdr-dispatch`)
/// is responsible for actually pacing delivery of these events over the action channels.
#[must_use]
pub fn evaluate(rules: &[Rule], message: &Message, envelope: &Envelope) -> Outcome {
    for rule in rules {
        match rule_matches(rule, message, envelope) {
            Ok(true) => return fire(rule),
            Ok(false) => continue,
            Err(err) => {
                return Outcome {
                    events: vec![Event::Error(err)],
                    matched_rule_id: None,
                }
            }
        }
    }

    Outcome {
        events: vec![Event::Drop { dropped_rule: false }],
        matched_rule_id: None,
    }
}

fn fire(rule: &Rule) -> Outcome {
    let mut events = Vec::with_capacity(rule.action.len());

    for action in &rule.action {
        match action {
            Action::Drop => events.push(Event::Drop { dropped_rule: true }),
            Action::Forward { to } => {
                events.extend(to.iter().cloned().map(|to| Event::Send { to }));
            }
            Action::Webhook { values } => {
                if values.len() == 2 {
                    events.push(Event::Webhook {
                        endpoint: values[0].clone(),
                        secret: values[1].clone(),
                    });
                } else {
                    return Outcome {
                        events: vec![Event::Error(RuleEvalError::InvalidWebhookArity(values.len()))],
                        matched_rule_id: None,
                    };
                }
            }
        }
    }

    Outcome {
        events,
        matched_rule_id: Some(rule.id.clone()),
    }
}

/// Rule match = conjunction of predicates (§3, §4.2). All predicates are evaluated;
/// the first that fails short-circuits the result to `false` but evaluation does not
/// early-return the enclosing loop (it still checks every `p ∈ P`, matching §4.2's
/// "all predicates are checked" wording) except insofar as further conjuncts cannot change
/// an already-`false` result.
fn rule_matches(rule: &Rule, message: &Message, envelope: &Envelope) -> Result<bool, RuleEvalError> {
    let mut all_true = true;
    for predicate in &rule.matches {
        if !predicate_matches(predicate, message, envelope)? {
            all_true = false;
        }
    }
    Ok(all_true)
}

fn predicate_matches(predicate: &Predicate, message: &Message, envelope: &Envelope) -> Result<bool, RuleEvalError> {
    match predicate {
        Predicate::All => Ok(true),
        Predicate::TimeAfter { epoch_ms } => {
            let now_ms = now_millis();
            Ok(now_ms >= *epoch_ms)
        }
        Predicate::Literal { field, value } => {
            let candidates = extract(*field, message, envelope)?;
            // First-matched-to breaks early (§9): any one candidate equal to `value` suffices.
            Ok(candidates.iter().any(|candidate| candidate == value))
        }
        Predicate::Regex { field, glob: pattern } => {
            let candidates = extract(*field, message, envelope)?;
            Ok(candidates.iter().any(|candidate| glob::matches(pattern, candidate)))
        }
    }
}

fn extract(field: Field, message: &Message, envelope: &Envelope) -> Result<Vec<String>, RuleEvalError> {
    fields::extract(field, message, envelope).map_err(RuleEvalError::FieldExtraction)
}

fn now_millis() -> i64 {
    i64::try_from(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or(i64::MAX)
}
