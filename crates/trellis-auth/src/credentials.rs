//! Account list and the sorted token store built from it.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{AuthError, Result};

/// A user name and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    /// User name, reported to later handlers on success.
    pub user: String,
    /// Password.
    pub password: String,
}

impl Account {
    /// Creates an account.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parses `user:password`. The password may itself contain `:`.
impl FromStr for Account {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        let (user, password) = s.split_once(':').ok_or(AuthError::MalformedAccount)?;
        Ok(Self::new(user, password))
    }
}

/// Returns the `Authorization` header value a client sends for the given
/// credentials.
///
/// ```
/// use trellis_auth::encode_token;
///
/// assert_eq!(encode_token("Aladdin", "open sesame"), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
/// ```
pub fn encode_token(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

struct Entry {
    token: String,
    user: String,
}

/// Immutable set of accepted credentials.
///
/// Entries are kept sorted by token. A lookup binary-searches for the single
/// candidate token and confirms it with a constant-time comparison.
pub struct CredentialStore {
    entries: Vec<Entry>,
}

impl CredentialStore {
    /// Builds a store from a non-empty list of accounts.
    ///
    /// # Errors
    ///
    /// [`AuthError::EmptyAccounts`] if no account is given,
    /// [`AuthError::EmptyField`] if an account has an empty user name or
    /// password.
    pub fn build(accounts: impl IntoIterator<Item = Account>) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, account) in accounts.into_iter().enumerate() {
            if account.user.is_empty() || account.password.is_empty() {
                return Err(AuthError::EmptyField { index });
            }
            entries.push(Entry {
                token: encode_token(&account.user, &account.password),
                user: account.user,
            });
        }
        if entries.is_empty() {
            return Err(AuthError::EmptyAccounts);
        }

        entries.sort_by(|a, b| a.token.cmp(&b.token));
        Ok(Self { entries })
    }

    /// Returns the user whose token equals `presented`.
    ///
    /// An empty `presented` never matches.
    pub fn lookup(&self, presented: &str) -> Option<&str> {
        if presented.is_empty() {
            return None;
        }
        let index = self
            .entries
            .partition_point(|e| e.token.as_str() < presented);
        let candidate = self.entries.get(index)?;
        constant_time_eq(candidate.token.as_bytes(), presented.as_bytes())
            .then_some(candidate.user.as_str())
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a successfully built store.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("users", &self.entries.iter().map(|e| &e.user).collect::<Vec<_>>())
            .finish()
    }
}

/// Compares two byte strings without an early exit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::build([Account::new("alice", "pw1"), Account::new("bob", "pw2")]).unwrap()
    }

    #[test]
    fn test_lookup_known_accounts() {
        let store = store();
        assert_eq!(store.lookup(&encode_token("alice", "pw1")), Some("alice"));
        assert_eq!(store.lookup(&encode_token("bob", "pw2")), Some("bob"));
        assert_eq!(store.lookup(&encode_token("alice", "pw2")), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_any_altered_byte_is_rejected() {
        let store = store();
        let token = encode_token("alice", "pw1");
        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] ^= 0x01;
            let altered = String::from_utf8(bytes).unwrap();
            assert_eq!(store.lookup(&altered), None, "altered byte {i}: {altered}");
        }
    }

    #[test]
    fn test_truncated_and_extended_tokens_are_rejected() {
        let store = store();
        let token = encode_token("bob", "pw2");
        assert_eq!(store.lookup(&token[..token.len() - 1]), None);
        assert_eq!(store.lookup(&format!("{token}=")), None);
        assert_eq!(store.lookup("Basic"), None);
        assert_eq!(store.lookup("zzz"), None);
    }

    #[test]
    fn test_empty_token_never_matches() {
        assert_eq!(store().lookup(""), None);
    }

    #[test]
    fn test_round_trip() {
        for (user, password) in [("carol", "s3cret"), ("dave", "pass:with:colons"), ("émile", "mot de passe")] {
            let store = CredentialStore::build([Account::new(user, password)]).unwrap();
            assert_eq!(store.lookup(&encode_token(user, password)), Some(user));
        }
    }

    #[test]
    fn test_entries_are_sorted() {
        let store = CredentialStore::build([
            Account::new("zed", "1"),
            Account::new("amy", "2"),
            Account::new("mia", "3"),
        ])
        .unwrap();
        assert!(store.entries.windows(2).all(|w| w[0].token <= w[1].token));
        for (user, password) in [("zed", "1"), ("amy", "2"), ("mia", "3")] {
            assert_eq!(store.lookup(&encode_token(user, password)), Some(user));
        }
    }

    #[test]
    fn test_build_errors() {
        assert_eq!(
            CredentialStore::build(Vec::new()).unwrap_err(),
            AuthError::EmptyAccounts
        );
        assert_eq!(
            CredentialStore::build([Account::new("alice", "pw"), Account::new("", "pw")])
                .unwrap_err(),
            AuthError::EmptyField { index: 1 }
        );
        assert_eq!(
            CredentialStore::build([Account::new("alice", "")]).unwrap_err(),
            AuthError::EmptyField { index: 0 }
        );
    }

    #[test]
    fn test_parse_account() {
        let account: Account = "alice:pw:1".parse().unwrap();
        assert_eq!(account, Account::new("alice", "pw:1"));
        assert_eq!("alice".parse::<Account>(), Err(AuthError::MalformedAccount));
        assert!(!format!("{account:?}").contains("pw:1"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
