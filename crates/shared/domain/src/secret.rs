//! Secret value object for password material.

use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::REDACTED;

/// Owned secret string that is wiped from memory when dropped.
///
/// Has no `Display` or `Serialize` implementation. Call [`Secret::expose`]
/// where a backend needs the plain value.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    inner: String,
}

impl Secret {
    /// Wrap a plain string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Borrow the plain value.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Whether the secret holds no characters.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Length in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.inner.chars().count()
    }
}

// Don't expose the value in debug output (security)
impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// Constant-time comparison
impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        let a = self.inner.as_bytes();
        let b = other.inner.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl Eq for Secret {}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Secret::new)
    }
}
