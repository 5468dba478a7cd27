//! Change events delivered by the realtime stream.

use crate::tab::{Tab, TabStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row mutation kind, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventType {
    Insert,
    Update,
    Delete,
}

/// Partial tab fields carried by a change event.
///
/// Every field except `id` is optional: an Update event names only the
/// columns that changed, and a Delete event carries the pre-delete row. Any
/// unrecognized fields on the wire are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabRecordPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl TabRecordPatch {
    /// A patch carrying only the row id.
    pub fn for_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tab_number: None,
            status: None,
            total: None,
            restaurant_id: None,
            customer_id: None,
        }
    }

    /// Field-level merge: only fields present in the patch overwrite the
    /// corresponding local fields. Totals are floored at zero. Returns true
    /// if any local field actually changed, so re-applying the same patch is
    /// observable as a no-op.
    pub fn apply_to(&self, tab: &mut Tab) -> bool {
        let mut changed = false;

        if let Some(number) = self.tab_number {
            if tab.tab_number != Some(number) {
                tab.tab_number = Some(number);
                changed = true;
            }
        }
        if let Some(status) = self.status {
            if tab.status != status {
                tab.status = status;
                changed = true;
            }
        }
        if let Some(total) = self.total {
            let total = total.max(0.0);
            if tab.total != total {
                tab.total = total;
                changed = true;
            }
        }
        if let Some(restaurant_id) = &self.restaurant_id {
            if tab.restaurant_id.as_deref() != Some(restaurant_id.as_str()) {
                tab.restaurant_id = Some(restaurant_id.clone());
                changed = true;
            }
        }
        if let Some(customer_id) = &self.customer_id {
            if tab.customer_id.as_deref() != Some(customer_id.as_str()) {
                tab.customer_id = Some(customer_id.clone());
                changed = true;
            }
        }

        changed
    }
}

/// A single row mutation pushed by the realtime stream.
///
/// Wire envelope: `{ "event_type": "INSERT"|"UPDATE"|"DELETE", "record": {...} }`.
/// `received_at` is assigned client-side on arrival; events may arrive
/// duplicated or out of order and are applied in delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_type: ChangeEventType,
    pub record: TabRecordPatch,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(event_type: ChangeEventType, record: TabRecordPatch) -> Self {
        Self {
            event_type,
            record,
            received_at: Utc::now(),
        }
    }
}
