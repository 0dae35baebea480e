//! Username (handle) derivation for new identities.

const FALLBACK_HANDLE: &str = "user";

/// The part of `email` before the first `@`, trimmed.
///
/// Falls back to `"user"` when the local part is empty.
#[must_use]
pub fn base_handle(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default().trim();
    if local.is_empty() {
        FALLBACK_HANDLE.to_string()
    } else {
        local.to_string()
    }
}

/// Candidate number `attempt`: `base`, then `base1`, `base2`, ...
#[must_use]
pub fn candidate(base: &str, attempt: u32) -> String {
    match attempt {
        0 => base.to_string(),
        n => format!("{base}{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_handle_is_local_part() {
        assert_eq!(base_handle("alice@x.com"), "alice");
        assert_eq!(base_handle("alice.b+rides@y.edu"), "alice.b+rides");
    }

    #[test]
    fn base_handle_without_at_sign_uses_whole_string() {
        assert_eq!(base_handle("alice"), "alice");
    }

    #[test]
    fn base_handle_empty_local_part_falls_back() {
        assert_eq!(base_handle("@x.com"), "user");
        assert_eq!(base_handle("  @x.com"), "user");
    }

    #[test]
    fn candidates_append_increasing_suffix() {
        let got: Vec<_> = (0..4).map(|n| candidate("bob", n)).collect();
        assert_eq!(got, ["bob", "bob1", "bob2", "bob3"]);
    }
}
