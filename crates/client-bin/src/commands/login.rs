//! `login` command: password sign-in.

use crate::app::ClientState;
use crate::commands::{prompt, prompt_or};

pub async fn run(state: &ClientState, email: Option<String>) -> anyhow::Result<()> {
    let email = prompt_or(email, "Email")?;
    let password = prompt("Password")?;

    let identity = state.gateway.sign_in(&email, &password).await?;
    println!(
        "Signed in as {}",
        identity.email.as_deref().unwrap_or(&identity.id)
    );
    Ok(())
}
