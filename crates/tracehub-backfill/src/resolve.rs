//! Client-side session reference resolution, mirroring the server's rules:
//! exact ID wins, otherwise a unique prefix; anything else is ambiguous or
//! unknown.

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Match(String),
    Ambiguous(Vec<String>),
    None,
}

pub fn resolve_reference(known_ids: &[String], reference: &str) -> Resolution {
    if known_ids.iter().any(|id| id == reference) {
        return Resolution::Match(reference.to_string());
    }

    let matches: Vec<String> = known_ids
        .iter()
        .filter(|id| id.starts_with(reference))
        .cloned()
        .collect();

    match matches.len() {
        0 => Resolution::None,
        1 => Resolution::Match(matches.into_iter().next().unwrap_or_default()),
        _ => Resolution::Ambiguous(matches),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        ["cc-alpha-1", "cc-alpha-2", "cc-beta-1"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_exact_match_wins() {
        assert_eq!(
            resolve_reference(&ids(), "cc-alpha-1"),
            Resolution::Match("cc-alpha-1".to_string())
        );
    }

    #[test]
    fn test_unique_prefix_resolves() {
        assert_eq!(
            resolve_reference(&ids(), "cc-beta"),
            Resolution::Match("cc-beta-1".to_string())
        );
    }

    #[test]
    fn test_ambiguous_prefix() {
        match resolve_reference(&ids(), "cc-alpha") {
            Resolution::Ambiguous(matches) => assert_eq!(matches.len(), 2),
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_no_match() {
        assert_eq!(resolve_reference(&ids(), "zz"), Resolution::None);
    }
}
