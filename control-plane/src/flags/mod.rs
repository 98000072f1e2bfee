pub mod error;
pub mod eval;
pub mod grammar;
pub mod hash;

pub use error::FlagError;
pub use eval::{evaluate, EvalReason, EvalResult, FlagForEval};
pub use grammar::{validate_rule, Rule, RuleValidationError, MAX_RULE_DEPTH};
pub use hash::stable_hash;
