use ulid::Ulid;

/// Mint a workspace ID: a 26-character uppercase Crockford-base32 ULID.
pub fn new_workspace_id() -> String {
    Ulid::new().to_string()
}

/// Returns `true` if `s` has the shape of a ULID (26 chars of the Crockford
/// base32 alphabet, uppercase). Used to tell internal IDs apart from
/// display names and canonical IDs in `:id` route segments.
pub fn is_ulid(s: &str) -> bool {
    s.len() == 26
        && s.bytes().all(|b| {
            b.is_ascii_digit() || (b.is_ascii_uppercase() && !matches!(b, b'I' | b'L' | b'O' | b'U'))
        })
}
