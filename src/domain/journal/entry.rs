use crate::domain::errors::JournalError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A reflective journal entry. At most one exists per (user, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub completion_percentage: u8,
    pub content: String,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

impl JournalEntry {
    pub fn new(id: &str, user_id: &str, date: NaiveDate) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            date,
            completion_percentage: 0,
            content: String::new(),
            screenshots: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), JournalError> {
        if self.id.trim().is_empty() {
            return Err(JournalError::validation("journal entry id is empty"));
        }
        if self.completion_percentage > 100 {
            return Err(JournalError::validation(format!(
                "completion percentage {} is outside 0..=100",
                self.completion_percentage
            )));
        }
        Ok(())
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn has_screenshots(&self) -> bool {
        !self.screenshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_completion_bounds() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut entry = JournalEntry::new("j1", "u1", date);
        entry.completion_percentage = 100;
        assert!(entry.validate().is_ok());

        entry.completion_percentage = 101;
        assert!(matches!(
            entry.validate(),
            Err(JournalError::Validation { .. })
        ));
    }

    #[test]
    fn test_content_flags() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut entry = JournalEntry::new("j1", "u1", date);
        assert!(!entry.has_content());
        assert!(!entry.has_screenshots());

        entry.content = "Waited for the retest, good patience.".to_string();
        entry.screenshots.push("charts/es-open.png".to_string());
        assert!(entry.has_content());
        assert!(entry.has_screenshots());
    }
}
