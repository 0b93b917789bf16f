//! Resource lifecycle phase.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a reconciled resource.
///
/// Transitions are monotonic: `Pending -> Running -> Done`. An
/// unrecognized value deserializes to `Unknown` and is treated as an
/// explicit no-op by the reconcilers, never as forward progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    /// Waiting for the resource to become actionable.
    Pending,
    /// Side effects are in flight.
    Running,
    /// Terminal; no further side effects or requeues.
    Done,
    /// Unrecognized wire value, preserved verbatim.
    Unknown(String),
}

impl Phase {
    /// Position in the `Pending -> Running -> Done` order.
    /// `Unknown` has no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Running => Some(1),
            Self::Done => Some(2),
            Self::Unknown(_) => None,
        }
    }

    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Unknown(s) => s,
        }
    }
}

impl From<String> for Phase {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "DONE" => Self::Done,
            _ => Self::Unknown(s),
        }
    }
}

impl From<Phase> for String {
    fn from(p: Phase) -> Self {
        p.as_str().to_string()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_roundtrip() {
        for raw in ["PENDING", "RUNNING", "DONE"] {
            let phase = Phase::from(raw.to_string());
            assert_eq!(String::from(phase.clone()), raw);
            assert!(phase.rank().is_some());
        }
    }

    #[test]
    fn test_unrecognized_phase_is_unknown() {
        let phase = Phase::from("CORRUPTED".to_string());
        assert_eq!(phase, Phase::Unknown("CORRUPTED".to_string()));
        assert_eq!(phase.rank(), None);
        // Preserved verbatim on the way back out.
        assert_eq!(String::from(phase), "CORRUPTED");
    }

    #[test]
    fn test_rank_is_monotonic() {
        assert!(Phase::Pending.rank() < Phase::Running.rank());
        assert!(Phase::Running.rank() < Phase::Done.rank());
    }

    #[test]
    fn test_serde_wire_format() {
        let json = serde_json::to_string(&Phase::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
        let back: Phase = serde_json::from_str("\"DONE\"").unwrap();
        assert_eq!(back, Phase::Done);
    }
}
