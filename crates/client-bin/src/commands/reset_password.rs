//! `reset-password` command: request a recovery email.

use crate::app::ClientState;

pub async fn run(state: &ClientState, email: &str) -> anyhow::Result<()> {
    state.gateway.reset_password(email).await?;
    println!("If an account exists for {email}, a reset email is on its way.");
    Ok(())
}
