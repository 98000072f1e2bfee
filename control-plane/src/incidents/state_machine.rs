use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentStatus {
    Open,
    Mitigated,
    Resolved,
}

impl IncidentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "MITIGATED" => Some(Self::Mitigated),
            "RESOLVED" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Mitigated => "MITIGATED",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal next states for `from`. `RESOLVED` is terminal: the source tree
/// contained a conflicting definition allowing `RESOLVED -> OPEN`, but this
/// implementation follows the spec's authoritative ruling that reopening
/// is out of scope for the core (see DESIGN.md).
pub fn next_states(from: IncidentStatus) -> &'static [IncidentStatus] {
    match from {
        IncidentStatus::Open => &[IncidentStatus::Mitigated, IncidentStatus::Resolved],
        IncidentStatus::Mitigated => &[IncidentStatus::Resolved],
        IncidentStatus::Resolved => &[],
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cannot transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: IncidentStatus,
    pub to: IncidentStatus,
}

pub fn validate_transition(
    from: IncidentStatus,
    to: IncidentStatus,
) -> Result<(), InvalidTransition> {
    if next_states(from).contains(&to) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_can_reach_mitigated_or_resolved() {
        assert!(validate_transition(IncidentStatus::Open, IncidentStatus::Mitigated).is_ok());
        assert!(validate_transition(IncidentStatus::Open, IncidentStatus::Resolved).is_ok());
    }

    #[test]
    fn mitigated_can_only_reach_resolved() {
        assert!(validate_transition(IncidentStatus::Mitigated, IncidentStatus::Resolved).is_ok());
        assert!(validate_transition(IncidentStatus::Mitigated, IncidentStatus::Open).is_err());
    }

    #[test]
    fn resolved_is_terminal() {
        assert!(next_states(IncidentStatus::Resolved).is_empty());
        assert!(validate_transition(IncidentStatus::Resolved, IncidentStatus::Open).is_err());
        assert!(validate_transition(IncidentStatus::Resolved, IncidentStatus::Mitigated).is_err());
    }

    #[test]
    fn self_transition_rejected() {
        assert!(validate_transition(IncidentStatus::Open, IncidentStatus::Open).is_err());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(IncidentStatus::parse("open"), Some(IncidentStatus::Open));
        assert_eq!(IncidentStatus::parse("bogus"), None);
    }
}
