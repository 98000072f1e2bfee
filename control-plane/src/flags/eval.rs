use serde::Serialize;
use uuid::Uuid;

use super::grammar::Rule;
use super::hash::stable_hash;

#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub enabled: bool,
    pub reason: EvalReason,
    pub trace: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalReason {
    FlagDisabled,
    EnvironmentMismatch,
    NoRules,
    RuleMatch,
    NoRuleMatched,
}

pub struct FlagForEval<'a> {
    pub key: &'a str,
    pub enabled: bool,
    pub environment: &'a str,
    pub rules: &'a [Rule],
}

/// Evaluates a flag for `user_id` against its rules in the order the spec
/// requires: a disabled flag or an environment mismatch short-circuits
/// before any rule runs; rules are then tried in list order and the first
/// match wins.
pub fn evaluate(flag: &FlagForEval<'_>, user_id: Uuid, requested_environment: &str) -> EvalResult {
    let mut trace = Vec::new();

    if !flag.enabled {
        trace.push("flag disabled".to_string());
        return EvalResult { enabled: false, reason: EvalReason::FlagDisabled, trace };
    }

    if !flag.environment.eq_ignore_ascii_case(requested_environment) {
        trace.push(format!(
            "environment mismatch: flag is {} but request is {}",
            flag.environment, requested_environment
        ));
        return EvalResult { enabled: false, reason: EvalReason::EnvironmentMismatch, trace };
    }

    if flag.rules.is_empty() {
        trace.push("no rules defined, flag enabled unconditionally".to_string());
        return EvalResult { enabled: true, reason: EvalReason::NoRules, trace };
    }

    for (index, rule) in flag.rules.iter().enumerate() {
        if rule_matches(rule, user_id, flag.key, &mut trace) {
            trace.push(format!("rule[{index}] matched"));
            return EvalResult { enabled: true, reason: EvalReason::RuleMatch, trace };
        }
    }

    trace.push("no rule matched".to_string());
    EvalResult { enabled: false, reason: EvalReason::NoRuleMatched, trace }
}

fn rule_matches(rule: &Rule, user_id: Uuid, flag_key: &str, trace: &mut Vec<String>) -> bool {
    match rule {
        Rule::Allowlist { user_ids } => user_ids.contains(&user_id),
        Rule::PercentRollout { percentage } => {
            let bucket = stable_hash(user_id, flag_key);
            trace.push(format!("bucket={bucket} threshold={percentage}"));
            bucket < *percentage
        }
        Rule::And { rules } => rules.iter().all(|r| rule_matches(r, user_id, flag_key, trace)),
        Rule::Or { rules } => rules.iter().any(|r| rule_matches(r, user_id, flag_key, trace)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_flag_short_circuits() {
        let flag = FlagForEval { key: "k", enabled: false, environment: "PROD", rules: &[] };
        let result = evaluate(&flag, Uuid::new_v4(), "PROD");
        assert!(!result.enabled);
        assert_eq!(result.reason, EvalReason::FlagDisabled);
    }

    #[test]
    fn environment_mismatch_short_circuits() {
        let flag = FlagForEval { key: "k", enabled: true, environment: "PROD", rules: &[] };
        let result = evaluate(&flag, Uuid::new_v4(), "STAGING");
        assert!(!result.enabled);
        assert_eq!(result.reason, EvalReason::EnvironmentMismatch);
    }

    #[test]
    fn no_rules_means_enabled() {
        let flag = FlagForEval { key: "k", enabled: true, environment: "PROD", rules: &[] };
        let result = evaluate(&flag, Uuid::new_v4(), "PROD");
        assert!(result.enabled);
        assert_eq!(result.reason, EvalReason::NoRules);
    }

    #[test]
    fn allowlist_match_enables() {
        let user_id = Uuid::new_v4();
        let rules = vec![Rule::Allowlist { user_ids: vec![user_id] }];
        let flag = FlagForEval { key: "k", enabled: true, environment: "PROD", rules: &rules };
        let result = evaluate(&flag, user_id, "PROD");
        assert!(result.enabled);
        assert_eq!(result.reason, EvalReason::RuleMatch);
    }

    #[test]
    fn non_matching_allowlist_falls_through() {
        let rules = vec![Rule::Allowlist { user_ids: vec![Uuid::new_v4()] }];
        let flag = FlagForEval { key: "k", enabled: true, environment: "PROD", rules: &rules };
        let result = evaluate(&flag, Uuid::new_v4(), "PROD");
        assert!(!result.enabled);
        assert_eq!(result.reason, EvalReason::NoRuleMatched);
    }

    #[test]
    fn percent_rollout_zero_never_matches() {
        let rules = vec![Rule::PercentRollout { percentage: 0 }];
        let flag = FlagForEval { key: "k", enabled: true, environment: "PROD", rules: &rules };
        let result = evaluate(&flag, Uuid::new_v4(), "PROD");
        assert!(!result.enabled);
    }

    #[test]
    fn percent_rollout_hundred_always_matches() {
        let rules = vec![Rule::PercentRollout { percentage: 100 }];
        let flag = FlagForEval { key: "k", enabled: true, environment: "PROD", rules: &rules };
        let result = evaluate(&flag, Uuid::new_v4(), "PROD");
        assert!(result.enabled);
    }
}
