//! Domain identifiers.
//!
//! Users are identified by opaque strings handed to us by the upstream
//! identity system. The only rule we enforce is that they are non-empty.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ValidationError;

/// Identifier of a user taking part in a decision (recipient or actor).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Build a `UserId`, rejecting the empty string.
    ///
    /// `on_empty` is the error reported for this particular field.
    pub fn parse(
        value: impl Into<String>,
        on_empty: ValidationError,
    ) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(on_empty);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
