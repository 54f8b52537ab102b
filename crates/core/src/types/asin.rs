//! Amazon Standard Identification Number.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Asin`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsinError {
    #[error("asin cannot be empty")]
    Empty,
    #[error("asin must be at most {max} characters")]
    TooLong { max: usize },
    #[error("asin must not contain whitespace")]
    Whitespace,
}

/// Unique product key.
///
/// Real ASINs are ten alphanumeric characters, but scraped items without one
/// are keyed by a generated UUID instead, so only emptiness, length and
/// embedded whitespace are checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asin(String);

impl Asin {
    /// Longest key accepted (a hyphenated UUID is 36).
    pub const MAX_LENGTH: usize = 64;

    /// Parse an ASIN, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, too long, or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, AsinError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AsinError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(AsinError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(AsinError::Whitespace);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Generate a stand-in key for an item the marketplace did not identify.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Asin {
    type Error = AsinError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Asin> for String {
    fn from(asin: Asin) -> Self {
        asin.0
    }
}

impl AsRef<str> for Asin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
