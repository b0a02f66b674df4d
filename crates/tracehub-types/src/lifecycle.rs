use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Processing lifecycle of a session, from first sighting to archival.
///
/// Transitions are guarded by [`Lifecycle::can_transition_to`]; everything
/// not listed there is invalid and must be rejected before any database work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// A session.start event has been seen.
    Detected,
    /// The session is live and accumulating activity.
    Capturing,
    /// A session.end event has been seen; transcript awaits parsing.
    Ended,
    /// Transcript parsed and persisted.
    Parsed,
    /// A summary has been generated on top of the parse.
    Summarized,
    /// Terminal happy state.
    Archived,
    /// Terminal failure state.
    Failed,
}

/// Lifecycle states from which no further transition is allowed.
pub const TERMINAL_LIFECYCLES: &[Lifecycle] = &[Lifecycle::Archived, Lifecycle::Failed];

impl Lifecycle {
    pub const ALL: &'static [Lifecycle] = &[
        Lifecycle::Detected,
        Lifecycle::Capturing,
        Lifecycle::Ended,
        Lifecycle::Parsed,
        Lifecycle::Summarized,
        Lifecycle::Archived,
        Lifecycle::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Detected => "detected",
            Lifecycle::Capturing => "capturing",
            Lifecycle::Ended => "ended",
            Lifecycle::Parsed => "parsed",
            Lifecycle::Summarized => "summarized",
            Lifecycle::Archived => "archived",
            Lifecycle::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "detected" => Ok(Lifecycle::Detected),
            "capturing" => Ok(Lifecycle::Capturing),
            "ended" => Ok(Lifecycle::Ended),
            "parsed" => Ok(Lifecycle::Parsed),
            "summarized" => Ok(Lifecycle::Summarized),
            "archived" => Ok(Lifecycle::Archived),
            "failed" => Ok(Lifecycle::Failed),
            other => Err(Error::InvalidLifecycle(other.to_string())),
        }
    }

    /// Returns the set of states that are valid successors of `self`.
    pub fn valid_transitions(&self) -> &'static [Lifecycle] {
        match self {
            Lifecycle::Detected => &[Lifecycle::Capturing, Lifecycle::Ended, Lifecycle::Failed],
            Lifecycle::Capturing => &[Lifecycle::Ended, Lifecycle::Failed],
            Lifecycle::Ended => &[Lifecycle::Parsed, Lifecycle::Failed],
            Lifecycle::Parsed => &[Lifecycle::Summarized, Lifecycle::Failed],
            Lifecycle::Summarized => &[Lifecycle::Archived],
            Lifecycle::Archived | Lifecycle::Failed => &[],
        }
    }

    /// Returns `true` if transitioning from `self` to `next` is valid.
    pub fn can_transition_to(&self, next: Lifecycle) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        TERMINAL_LIFECYCLES.contains(self)
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse progress of a session's transcript, orthogonal to [`Lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    Pending,
    Parsing,
    Completed,
    Failed,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Pending => "pending",
            ParseStatus::Parsing => "parsing",
            ParseStatus::Completed => "completed",
            ParseStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ParseStatus::Pending),
            "parsing" => Ok(ParseStatus::Parsing),
            "completed" => Ok(ParseStatus::Completed),
            "failed" => Ok(ParseStatus::Failed),
            other => Err(Error::InvalidParseStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_exhaustive() {
        // Every (from, to) pair outside the documented table must be invalid.
        let allowed: &[(Lifecycle, Lifecycle)] = &[
            (Lifecycle::Detected, Lifecycle::Capturing),
            (Lifecycle::Detected, Lifecycle::Ended),
            (Lifecycle::Detected, Lifecycle::Failed),
            (Lifecycle::Capturing, Lifecycle::Ended),
            (Lifecycle::Capturing, Lifecycle::Failed),
            (Lifecycle::Ended, Lifecycle::Parsed),
            (Lifecycle::Ended, Lifecycle::Failed),
            (Lifecycle::Parsed, Lifecycle::Summarized),
            (Lifecycle::Parsed, Lifecycle::Failed),
            (Lifecycle::Summarized, Lifecycle::Archived),
        ];

        for &from in Lifecycle::ALL {
            for &to in Lifecycle::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{} -> {} should be {}",
                    from,
                    to,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        assert!(Lifecycle::Archived.valid_transitions().is_empty());
        assert!(Lifecycle::Failed.valid_transitions().is_empty());
        assert!(Lifecycle::Archived.is_terminal());
        assert!(Lifecycle::Failed.is_terminal());
        assert!(!Lifecycle::Parsed.is_terminal());
    }

    #[test]
    fn test_parse_round_trip() {
        for &state in Lifecycle::ALL {
            assert_eq!(Lifecycle::parse(state.as_str()).unwrap(), state);
        }
        assert!(Lifecycle::parse("bogus").is_err());
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&Lifecycle::Capturing).unwrap();
        assert_eq!(json, "\"capturing\"");
        let back: Lifecycle = serde_json::from_str("\"parsed\"").unwrap();
        assert_eq!(back, Lifecycle::Parsed);
    }

    #[test]
    fn test_parse_status_round_trip() {
        for s in ["pending", "parsing", "completed", "failed"] {
            assert_eq!(ParseStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(ParseStatus::parse("done").is_err());
    }
}
