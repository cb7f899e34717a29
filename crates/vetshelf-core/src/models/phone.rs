//! Phone entries.

use serde::{Deserialize, Serialize};

/// An immutable phone entry. Change one by building a replacement with
/// [`PhoneInfo::with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneInfo {
    number: String,
    #[serde(default)]
    note: String,
}

/// Partial update for a [`PhoneInfo`].
#[derive(Debug, Clone, Default)]
pub struct PhoneDiff {
    pub number: Option<String>,
    pub note: Option<String>,
}

impl PhoneInfo {
    pub fn new(number: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            note: note.into(),
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// A copy with the supplied fields replaced.
    pub fn with(&self, diff: PhoneDiff) -> PhoneInfo {
        PhoneInfo {
            number: diff.number.unwrap_or_else(|| self.number.clone()),
            note: diff.note.unwrap_or_else(|| self.note.clone()),
        }
    }

    /// Dialable characters only; anything after "ext" is dropped.
    pub fn pure_number(&self) -> String {
        let main = self.number.split("ext").next().unwrap_or_default();
        main.chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '#' | 'x'))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_replaces_only_given_fields() {
        let phone = PhoneInfo::new("555-1234", "home");
        let updated = phone.with(PhoneDiff {
            note: Some("work".into()),
            ..Default::default()
        });
        assert_eq!(updated.number(), "555-1234");
        assert_eq!(updated.note(), "work");
        assert_eq!(phone.note(), "home");
    }

    #[test]
    fn test_pure_number() {
        assert_eq!(PhoneInfo::new("(555) 123-4567", "").pure_number(), "5551234567");
        assert_eq!(PhoneInfo::new("+1 555 1234 ext 12", "").pure_number(), "+15551234");
    }

    #[test]
    fn test_missing_note_deserializes() {
        let phone: PhoneInfo = serde_json::from_str(r#"{"number": "555"}"#).unwrap();
        assert_eq!(phone.note(), "");
    }
}
