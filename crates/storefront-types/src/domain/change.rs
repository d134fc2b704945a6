use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Products,
    CartItems,
    Orders,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Events were dropped; refetch everything.
    Resync,
}

/// "Row changed" notification. Carries no row payload; subscribers refetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub user_id: Uuid,
    pub row_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, user_id: Uuid, row_id: Option<Uuid>) -> Self {
        Self {
            table,
            kind,
            user_id,
            row_id,
            at: Utc::now(),
        }
    }
}
