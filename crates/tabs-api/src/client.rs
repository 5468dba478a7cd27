//! REST client for the tabs tables.
//!
//! Thin PostgREST wrapper: every call carries the project `apikey` plus the
//! caller's bearer token, so row-level security scopes results to the signed-in
//! customer.

use crate::error::{TabsApiError, TabsApiResult};
use tab_protocol_types::{RestaurantInfo, Tab};
use tracing::{debug, error};

/// Embedded-resource select for a tab fetch: the restaurant summary and the
/// order lines come back joined in one request.
pub const ACTIVE_TABS_SELECT: &str =
    "*,restaurant:restaurants(id,name,logo_url),orders(id,status,total,created_at)";

/// Join codes are stored uppercase; user input is normalized before lookup.
fn normalize_join_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Client for tab, restaurant, and order rows.
#[derive(Clone)]
pub struct TabsClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl TabsClient {
    /// Create a new tabs client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            anon_key: anon_key.into(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    fn active_tabs_url(&self, customer_id: &str) -> String {
        format!(
            "{}?select={}&customer_id=eq.{}&status=eq.active&order=updated_at.desc",
            self.rest_url("tabs"),
            ACTIVE_TABS_SELECT,
            customer_id
        )
    }

    fn restaurant_lookup_url(&self, join_code: &str) -> String {
        format!(
            "{}?select=id,name,logo_url&join_code=eq.{}&limit=1",
            self.rest_url("restaurants"),
            join_code
        )
    }

    /// Fetch the customer's active tabs, newest update first, with the
    /// restaurant summary and order lines joined in.
    pub async fn fetch_active_tabs(
        &self,
        customer_id: &str,
        access_token: &str,
    ) -> TabsApiResult<Vec<Tab>> {
        let url = self.active_tabs_url(customer_id);
        debug!(customer_id, "fetching active tabs");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, "fetch_active_tabs").await);
        }

        let mut tabs: Vec<Tab> = response.json().await?;
        for tab in &mut tabs {
            tab.recompute_totals();
        }
        debug!(count = tabs.len(), "fetched active tabs");
        Ok(tabs)
    }

    /// Look up a restaurant by its printed join code. `None` when no
    /// restaurant carries the code.
    pub async fn find_restaurant_by_code(
        &self,
        code: &str,
        access_token: &str,
    ) -> TabsApiResult<Option<RestaurantInfo>> {
        let code = normalize_join_code(code);
        let url = self.restaurant_lookup_url(&code);
        debug!(join_code = %code, "looking up restaurant");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, "find_restaurant_by_code").await);
        }

        let rows: Vec<RestaurantInfo> = response.json().await?;
        Ok(rows.into_iter().next())
    }

    /// Open a new tab for the customer at a restaurant. The created row comes
    /// back via `Prefer: return=representation`.
    pub async fn create_tab(
        &self,
        restaurant_id: &str,
        customer_id: &str,
        access_token: &str,
    ) -> TabsApiResult<Tab> {
        debug!(restaurant_id, customer_id, "creating tab");

        let response = self
            .http_client
            .post(self.rest_url("tabs"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({
                "restaurant_id": restaurant_id,
                "customer_id": customer_id,
                "status": "active",
                "total": 0.0,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, "create_tab").await);
        }

        let rows: Vec<Tab> = response.json().await?;
        rows.into_iter()
            .next()
            .map(|mut tab| {
                tab.recompute_totals();
                tab
            })
            .ok_or_else(|| {
                TabsApiError::UnexpectedResponse(
                    "tab insert returned an empty representation".to_string(),
                )
            })
    }
}

impl std::fmt::Debug for TabsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabsClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// Turn a non-success response into an error. The body is logged here; the
/// returned error carries it for callers that want to inspect it.
async fn failure(response: reqwest::Response, operation: &'static str) -> TabsApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!(operation, status = %status, body = %body, "tabs API request failed");
    TabsApiError::Api { status, body }
}
