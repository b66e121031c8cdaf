//! Password policy - stateless validation of proposed passwords.
//!
//! A rejection here short-circuits the whole change request before any
//! backend is contacted.

use crate::constants::{MIN_PASSWORD_CHAR_CLASSES, MIN_PASSWORD_LENGTH, PASSWORD_CHAR_CLASS_COUNT};
use crate::error::{DomainError, DomainResult};
use crate::secret::Secret;

/// Password policy value object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    min_length: usize,
    min_char_classes: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            min_char_classes: MIN_PASSWORD_CHAR_CLASSES,
        }
    }
}

impl PasswordPolicy {
    /// Create a policy with the given minimum length and character classes.
    ///
    /// `min_char_classes` is clamped to the number of classes that exist.
    pub fn new(min_length: usize, min_char_classes: usize) -> Self {
        Self {
            min_length,
            min_char_classes: min_char_classes.min(PASSWORD_CHAR_CLASS_COUNT),
        }
    }

    /// Configured minimum length.
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Configured minimum number of character classes.
    pub fn min_char_classes(&self) -> usize {
        self.min_char_classes
    }

    /// Validate a proposed password.
    ///
    /// # Errors
    /// Returns `DomainError::Password` when the password is shorter than the
    /// minimum length or draws from too few character classes.
    pub fn validate(&self, password: &Secret) -> DomainResult<()> {
        if password.char_count() < self.min_length {
            return Err(DomainError::password(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }

        let classes = Self::char_classes(password.expose());
        if classes < self.min_char_classes {
            return Err(DomainError::password(format!(
                "Password must mix at least {} of: lowercase, uppercase, digits, symbols",
                self.min_char_classes
            )));
        }

        Ok(())
    }

    /// Check that an optional confirmation matches the new password.
    pub fn validate_confirmation(
        &self,
        password: &Secret,
        confirm: Option<&Secret>,
    ) -> DomainResult<()> {
        match confirm {
            Some(confirm) if confirm != password => Err(DomainError::validation(
                "New password and confirmation do not match",
            )),
            _ => Ok(()),
        }
    }

    fn char_classes(plain: &str) -> usize {
        let mut seen = [false; PASSWORD_CHAR_CLASS_COUNT];
        for c in plain.chars() {
            let idx = if c.is_lowercase() {
                0
            } else if c.is_uppercase() {
                1
            } else if c.is_numeric() {
                2
            } else {
                3
            };
            seen[idx] = true;
        }
        seen.iter().filter(|s| **s).count()
    }
}
