pub mod engine;
pub mod fields;
pub mod glob;
pub mod types;

pub use engine::{evaluate, Event, Outcome};
pub use types::{Action, Field, Predicate, Rule};
