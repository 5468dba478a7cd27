//! Tab domain types as fetched from the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    /// Open and accepting orders.
    Active,
    /// Settled by the customer.
    Paid,
    /// Voided by staff.
    Cancelled,
}

impl TabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabStatus::Active => "active",
            TabStatus::Paid => "paid",
            TabStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for TabStatus {
    fn default() -> Self {
        TabStatus::Active
    }
}

impl std::fmt::Display for TabStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kitchen-side status of a single order on a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// Restaurant summary joined into a tab fetch for display purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// A single order line joined into a tab fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A customer's running bill at a restaurant.
///
/// Keyed uniquely by `id` in the local collection. `total` and `order_count`
/// are derived from the embedded `orders` on fetch; realtime updates patch
/// `total` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Server-assigned display number, rendered as `T-<n>`.
    #[serde(default)]
    pub tab_number: Option<i64>,
    #[serde(default)]
    pub status: TabStatus,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub order_count: usize,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub restaurant: Option<RestaurantInfo>,
    #[serde(default)]
    pub orders: Vec<OrderLine>,
}

impl Tab {
    /// Short identifier for display and notifications: `T-<tab_number>`,
    /// falling back to the row id when the server has not assigned a number.
    pub fn display_number(&self) -> String {
        match self.tab_number {
            Some(n) => format!("T-{n}"),
            None => self.id.clone(),
        }
    }

    /// Restaurant display name, when the joined summary was fetched.
    pub fn restaurant_name(&self) -> Option<&str> {
        self.restaurant.as_ref().map(|r| r.name.as_str())
    }

    /// Recompute `total` and `order_count` from the embedded orders.
    ///
    /// The total is the sum of the order totals, floored at zero.
    pub fn recompute_totals(&mut self) {
        self.total = self.orders.iter().map(|o| o.total).sum::<f64>().max(0.0);
        self.order_count = self.orders.len();
    }
}
