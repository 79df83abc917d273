//! Secure secrets handling with automatic redaction in Debug output.
//!
//! Tenant credentials must never appear in logs, task summaries, or error
//! messages in plaintext (see the Credential Vault invariant). [`SecretString`]
//! wraps a plaintext value and redacts it whenever it is formatted with
//! `{:?}`, so a stray `tracing::debug!(?password)` cannot leak it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A string holding sensitive data, redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Access the plaintext value. Callers must not log or persist the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(\"{}\")", redact_secret(&self.0))
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Redact a secret, keeping only the first 4 characters for identification.
pub fn redact_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = secret.chars().collect();
    let prefix_len = chars.len().min(4);
    format!("{}...", chars[..prefix_len].iter().collect::<String>())
}

/// Decrypted tenant credentials. Exists only for the duration of one
/// extraction or download invocation, inside the pipeline process.
#[derive(Clone)]
pub struct TenantCredentials {
    pub email: SecretString,
    pub password: SecretString,
}

impl fmt::Debug for TenantCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantCredentials")
            .field("email", &self.email)
            .field("password", &self.password)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_to_prefix() {
        assert_eq!(redact_secret("sk_test_abcdefgh"), "sk_t...");
        assert_eq!(redact_secret("shor"), "shor...");
        assert_eq!(redact_secret(""), "");
    }

    #[test]
    fn debug_never_prints_full_secret() {
        let s = SecretString::new("hunter2-super-secret".to_string());
        let printed = format!("{:?}", s);
        assert!(!printed.contains("super-secret"));
    }
}
