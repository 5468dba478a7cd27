//! REST access to tab, restaurant, and order rows.

mod client;
mod error;

pub use client::{TabsClient, ACTIVE_TABS_SELECT};
pub use error::{TabsApiError, TabsApiResult};
