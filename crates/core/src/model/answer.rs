use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when building an answer value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerError {
    #[error("answer value {0} is outside 0..=4")]
    OutOfRange(u8),
}

//
// ─── ANSWER VALUE ─────────────────────────────────────────────────────────────
//

/// Ordinal rating given to a single question, from 0 (not at all) to 4 (extremely).
///
/// The server owns the meaning of each level; the client only enforces the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AnswerValue(u8);

impl AnswerValue {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 4;

    /// Converts a raw rating into an `AnswerValue`.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::OutOfRange` if the value is greater than 4.
    pub fn from_u8(value: u8) -> Result<Self, AnswerError> {
        if value > Self::MAX {
            return Err(AnswerError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// All valid values, lowest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl TryFrom<u8> for AnswerValue {
    type Error = AnswerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

impl From<AnswerValue> for u8 {
    fn from(value: AnswerValue) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_through_four() {
        let values: Vec<u8> = AnswerValue::all().map(AnswerValue::value).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
        assert_eq!(AnswerValue::from_u8(5), Err(AnswerError::OutOfRange(5)));
    }

    #[test]
    fn deserialization_enforces_range() {
        let ok: Vec<Option<AnswerValue>> = serde_json::from_str("[0, null, 4]").unwrap();
        assert_eq!(ok[1], None);
        assert_eq!(ok[2].map(AnswerValue::value), Some(4));

        assert!(serde_json::from_str::<AnswerValue>("9").is_err());
    }
}
