use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_RULE_DEPTH: u32 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Rule {
    #[serde(rename = "ALLOWLIST")]
    Allowlist { user_ids: Vec<Uuid> },
    #[serde(rename = "PERCENT_ROLLOUT")]
    PercentRollout { percentage: u32 },
    #[serde(rename = "AND")]
    And { rules: Vec<Rule> },
    #[serde(rename = "OR")]
    Or { rules: Vec<Rule> },
}

#[derive(Debug, thiserror::Error)]
pub enum RuleValidationError {
    #[error("percentage must be between 0 and 100")]
    PercentageOutOfRange,
    #[error("{0} requires at least one child rule")]
    EmptyCombinator(&'static str),
    #[error("rule tree exceeds maximum depth of {MAX_RULE_DEPTH}")]
    TooDeep,
}

pub fn validate_rule(rule: &Rule) -> Result<(), RuleValidationError> {
    validate_at_depth(rule, 1)
}

fn validate_at_depth(rule: &Rule, depth: u32) -> Result<(), RuleValidationError> {
    if depth > MAX_RULE_DEPTH {
        return Err(RuleValidationError::TooDeep);
    }
    match rule {
        Rule::Allowlist { .. } => Ok(()),
        Rule::PercentRollout { percentage } => {
            if *percentage > 100 {
                Err(RuleValidationError::PercentageOutOfRange)
            } else {
                Ok(())
            }
        }
        Rule::And { rules } => {
            if rules.is_empty() {
                return Err(RuleValidationError::EmptyCombinator("AND"));
            }
            rules.iter().try_for_each(|r| validate_at_depth(r, depth + 1))
        }
        Rule::Or { rules } => {
            if rules.is_empty() {
                return Err(RuleValidationError::EmptyCombinator("OR"));
            }
            rules.iter().try_for_each(|r| validate_at_depth(r, depth + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_over_100_rejected() {
        let rule = Rule::PercentRollout { percentage: 101 };
        assert!(validate_rule(&rule).is_err());
    }

    #[test]
    fn empty_and_rejected() {
        let rule = Rule::And { rules: vec![] };
        assert!(matches!(
            validate_rule(&rule),
            Err(RuleValidationError::EmptyCombinator("AND"))
        ));
    }

    #[test]
    fn nested_valid_rule_passes() {
        let rule = Rule::Or {
            rules: vec![
                Rule::PercentRollout { percentage: 50 },
                Rule::Allowlist { user_ids: vec![Uuid::new_v4()] },
            ],
        };
        assert!(validate_rule(&rule).is_ok());
    }

    #[test]
    fn depth_beyond_limit_rejected() {
        let mut rule = Rule::PercentRollout { percentage: 10 };
        for _ in 0..MAX_RULE_DEPTH + 1 {
            rule = Rule::And { rules: vec![rule] };
        }
        assert!(matches!(validate_rule(&rule), Err(RuleValidationError::TooDeep)));
    }
}
