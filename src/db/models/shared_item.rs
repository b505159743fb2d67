use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The kind of owned item a share record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Appointment,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Task => "task",
            ItemKind::Appointment => "appointment",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A share record: grants one recipient visibility over one owned item.
/// `confirmed`/`declined` are the stored two-flag shape of the tri-state
/// invitation response; only appointment shares ever set them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SharedItem {
    pub id: String,
    pub item_type: ItemKind,
    pub item_id: String,
    pub shared_by: String,
    pub shared_with: String,
    pub confirmed: Option<bool>,
    pub declined: Option<bool>,
    pub created_at: NaiveDateTime,
}

/// A share record joined with the recipient's username, as needed to build
/// the sharing-info projection.
#[derive(Debug, Clone, FromRow)]
pub struct ShareWithRecipient {
    pub shared_with: String,
    pub recipient_username: String,
    pub confirmed: Option<bool>,
    pub declined: Option<bool>,
}
