//! `signup` command: create an account.

use crate::app::ClientState;
use crate::commands::{prompt, prompt_or};

pub async fn run(
    state: &ClientState,
    email: Option<String>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let email = prompt_or(email, "Email")?;
    let name = prompt_or(name, "Name")?;
    let password = prompt("Password (min 8 characters)")?;

    let mut metadata = serde_json::Map::new();
    metadata.insert("name".to_string(), serde_json::Value::String(name));

    let result = state.gateway.sign_up(&email, &password, metadata).await?;
    if result.requires_email_confirmation {
        println!("Account created for {email}. Confirm the address from your inbox, then sign in.");
    } else {
        println!(
            "Signed up and signed in as {}",
            result.identity.email.as_deref().unwrap_or(&result.identity.id)
        );
    }
    Ok(())
}
