use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bearer credential presented to evaluator backends.
///
/// Acquired once at process start and shared for the process lifetime; it is
/// never refreshed. Wiped from memory on drop and redacted from `Debug`.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// A token that adds no `Authorization` header.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("AccessToken(anonymous)")
        } else {
            f.write_str("AccessToken(***)")
        }
    }
}
