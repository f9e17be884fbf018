use serde::{Deserialize, Serialize};

/// Which message field a `LITERAL`/`REGEX` predicate extracts candidates from (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    To,
    From,
    Subject,
}

/// A single test a message either satisfies or fails (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Predicate {
    All,
    Literal { field: Field, value: String },
    Regex { field: Field, glob: String },
    TimeAfter { epoch_ms: i64 },
}

/// A downstream fate for a matched message (§3).
///
/// `Webhook` keeps its two values as a raw, arity-checked-at-evaluation-time list (rather
/// than typed `endpoint`/`secret_token` fields) because the source data arrives that way
/// from both resolver backends (§4.4) and §4.2 names "value list whose length != 2" as a
/// rule-evaluation error rather than a config-load error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Action {
    Drop,
    Forward { to: Vec<String> },
    Webhook { values: Vec<String> },
}

/// A named conjunction of predicates and the ordered actions that fire when it matches
/// (§3). Rules are evaluated in list order; the first whose predicates all hold is the only
/// one whose actions fire (first-match-wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(rename = "match")]
    pub matches: Vec<Predicate>,
    pub action: Vec<Action>,
}
