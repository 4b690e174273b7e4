use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TodoError;

/// Category assigned when the user does not pick one.
pub const DEFAULT_CATEGORY: &str = "General";

/// Categories offered by the add/edit forms. Any other label is accepted too.
pub const CATEGORIES: [&str; 6] = ["General", "Work", "Personal", "Shopping", "Health", "Study"];

/// Day/month/year format used for due dates.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Importance of a task.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" | "H" => Ok(Priority::High),
            "MEDIUM" | "M" => Ok(Priority::Medium),
            "LOW" | "L" => Ok(Priority::Low),
            _ => Err(TodoError::Validation {
                field: "priority",
                message: format!("unknown priority '{}', use HIGH, MEDIUM or LOW", s),
            }),
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// A single to-do item as stored in the task collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Document id, assigned by the store on creation. `None` until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id of the signed-in user who owns the task.
    pub user_id: String,
    /// Short display title.
    pub title: String,
    /// Longer description; may be empty on records read back from the store.
    #[serde(default)]
    pub description: String,
    /// Due date in day/month/year form (e.g. `01/05/2025`).
    pub date: String,
    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    /// Free-text category label.
    #[serde(default = "default_category")]
    pub category: String,
    /// Set by the store on the first write.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the store on every write.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates an unsaved task with the default priority and category.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        date: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Task {
            id: None,
            user_id: user_id.into(),
            title: title.into(),
            description: description.into(),
            date: date.into(),
            completed: false,
            priority: Priority::default(),
            category: default_category(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = if category.trim().is_empty() { default_category() } else { category };
        self
    }

    /// Returns the id, trimmed, if the task has been saved.
    pub fn saved_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Checks the fields the forms require before anything is sent to a store.
    ///
    /// Title, description and date must be non-blank; the date is not parsed.
    pub fn validate(&self) -> Result<(), TodoError> {
        let required = [
            ("title", &self.title, "Title is required"),
            ("description", &self.description, "Description is required"),
            ("date", &self.date, "Date is required"),
        ];
        for (field, value, message) in required {
            if value.trim().is_empty() {
                return Err(TodoError::Validation { field, message: message.to_string() });
            }
        }
        Ok(())
    }
}

/// Public profile of a signed-in user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>) -> Self {
        UserProfile { uid: uid.into(), display_name: None, email: None, photo_url: None }
    }

    /// Name to greet the user with: display name, then email, then uid.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}
