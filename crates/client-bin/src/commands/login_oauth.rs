//! `login-oauth` command: browser OAuth with a pasted callback.
//!
//! Outside the mobile shell there is no deep-link handler, so the callback
//! URL the browser lands on is pasted back into the terminal by hand.

use crate::app::ClientState;
use crate::commands::prompt;
use url::Url;

pub async fn run(state: &ClientState, provider: &str) -> anyhow::Result<()> {
    let authorize_url = state.gateway.begin_oauth(provider).await?;

    println!("Open this URL in your browser:\n\n  {authorize_url}\n");
    println!(
        "After approving, the browser redirects to {}://login-callback?...",
        state.config.app_scheme
    );
    let pasted = prompt("Paste the full callback URL")?;
    let callback = Url::parse(&pasted)?;

    let identity = state.gateway.complete_oauth_callback(&callback).await?;
    println!(
        "Signed in as {}",
        identity.email.as_deref().unwrap_or(&identity.id)
    );
    Ok(())
}
