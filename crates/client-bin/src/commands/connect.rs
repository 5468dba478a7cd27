//! `connect` command: open a tab at a restaurant by join code.

use crate::app::ClientState;
use crate::commands::prompt;
use anyhow::Context;

pub async fn run(state: &ClientState, code: &str) -> anyhow::Result<()> {
    // Sessions are in-memory, so every invocation authenticates first.
    let email = prompt("Email")?;
    let password = prompt("Password")?;
    let identity = state.gateway.sign_in(&email, &password).await?;
    let token = state
        .store
        .access_token()
        .context("no session after sign-in")?;

    let Some(restaurant) = state.tabs_client.find_restaurant_by_code(code, &token).await? else {
        println!("No restaurant found for code {}", code.trim().to_uppercase());
        return Ok(());
    };

    println!("Connecting to {}...", restaurant.name);
    let tab = state
        .tabs_client
        .create_tab(&restaurant.id, &identity.id, &token)
        .await?;
    println!("Tab {} opened at {}", tab.display_number(), restaurant.name);
    Ok(())
}
