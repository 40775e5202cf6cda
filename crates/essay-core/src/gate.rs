//! Shared-passphrase login gate.
//!
//! There are no per-user accounts: one passphrase is handed out to a whole
//! class, and the display name only seeds a readable user id.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::AuthError;

const MAX_SLUG_CHARS: usize = 24;
const SUFFIX_CHARS: usize = 6;

/// Who is logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

pub struct CredentialGate {
    passphrase: String,
}

impl CredentialGate {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self { passphrase: passphrase.into() }
    }

    /// Checks the name first, then the passphrase. On success mints a fresh
    /// user id with a random suffix, so two logins never share an id.
    pub fn login(&self, name: &str, passphrase: &str) -> Result<Identity, AuthError> {
        let display_name = name.trim();
        if display_name.is_empty() {
            return Err(AuthError::EmptyName);
        }
        if !passphrase_matches(passphrase, &self.passphrase) {
            tracing::info!("login rejected: wrong passphrase");
            return Err(AuthError::WrongPassphrase);
        }

        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(SUFFIX_CHARS).collect();
        let identity = Identity {
            user_id: format!("{}-{}", slug(display_name), suffix),
            display_name: display_name.to_string(),
        };
        tracing::info!(user_id = %identity.user_id, "login accepted");
        Ok(identity)
    }
}

/// Turns a display name into an id-safe slug: whitespace runs become `-`,
/// anything outside ASCII alphanumerics, `-` and Hangul syllables is dropped.
pub fn slug(name: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();

    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    let disallowed =
        DISALLOWED.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\-가-힣]").expect("valid regex"));

    let dashed = whitespace.replace_all(name.trim(), "-");
    let cleaned = disallowed.replace_all(&dashed, "");
    let slug = if cleaned.is_empty() { "user" } else { cleaned.as_ref() };
    slug.chars().take(MAX_SLUG_CHARS).collect()
}

/// Byte comparison whose timing does not depend on where the inputs differ.
fn passphrase_matches(candidate: &str, expected: &str) -> bool {
    let (a, b) = (candidate.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_accepts_correct_passphrase() {
        let gate = CredentialGate::new("class-2024");
        let identity = gate.login("  Kim  ", "class-2024").unwrap();
        assert_eq!(identity.display_name, "Kim");
        assert!(identity.user_id.starts_with("Kim-"));
        assert_eq!(identity.user_id.len(), "Kim-".len() + SUFFIX_CHARS);
    }

    #[test]
    fn test_repeated_logins_get_distinct_ids() {
        let gate = CredentialGate::new("pw");
        let ids: std::collections::HashSet<String> = (0..50)
            .map(|_| gate.login("Kim", "pw").unwrap().user_id)
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_wrong_passphrase_is_rejected() {
        let gate = CredentialGate::new("pw");
        assert_eq!(gate.login("Kim", "PW"), Err(AuthError::WrongPassphrase));
        assert_eq!(gate.login("Kim", ""), Err(AuthError::WrongPassphrase));
        assert_eq!(gate.login("Kim", "pw "), Err(AuthError::WrongPassphrase));
    }

    #[test]
    fn test_empty_name_checked_before_passphrase() {
        let gate = CredentialGate::new("pw");
        assert_eq!(gate.login("   ", "wrong"), Err(AuthError::EmptyName));
        assert_eq!(gate.login("", "pw"), Err(AuthError::EmptyName));
    }

    #[test]
    fn test_slug_rules() {
        assert_eq!(slug("Kim Min  Jun"), "Kim-Min-Jun");
        assert_eq!(slug("  lee\tso-ra "), "lee-so-ra");
        assert_eq!(slug("김민준 (3반)"), "김민준-3반");
        assert_eq!(slug("@@@"), "user");
        assert_eq!(slug("a.b_c"), "abc");
        assert_eq!(slug(&"x".repeat(40)).chars().count(), MAX_SLUG_CHARS);
    }

    #[test]
    fn test_passphrase_matches() {
        assert!(passphrase_matches("abc", "abc"));
        assert!(!passphrase_matches("abd", "abc"));
        assert!(!passphrase_matches("ab", "abc"));
        assert!(passphrase_matches("", ""));
    }
}
