//! `watch` command: live view of the active-tab collection.
//!
//! Signs in, subscribes the reconciler, and then plays the UI loop's role:
//! draining the UI work queue so listener callbacks run here, on this task.

use crate::app::ClientState;
use crate::commands::prompt;
use anyhow::Context;
use std::time::Duration;
use tab_protocol_types::{format_currency, Tab};
use tab_realtime_reconciler::TabsUiEffect;

pub async fn run(state: &ClientState) -> anyhow::Result<()> {
    let email = prompt("Email")?;
    let password = prompt("Password")?;
    let identity = state.gateway.sign_in(&email, &password).await?;
    let token = state
        .store
        .access_token()
        .context("no session after sign-in")?;
    println!(
        "Signed in as {}. Watching tabs (Ctrl-C to quit).",
        identity.email.as_deref().unwrap_or(&identity.id)
    );

    let _effects = state.reconciler.on_effect(|effect| match effect {
        TabsUiEffect::Refreshed(tabs) => print_collection(tabs),
        TabsUiEffect::Updated(tab) => {
            println!("{} -> {}", tab.display_number(), format_currency(tab.total));
        }
        TabsUiEffect::Removed(id) => println!("tab {id} closed"),
        TabsUiEffect::Toast(text) => println!("* {text}"),
    });
    let _status = state
        .reconciler
        .on_status(|status| println!("[realtime: {status:?}]"));

    state.reconciler.subscribe(&token, &identity.id)?;

    let mut queue = state.take_ui_queue().context("UI queue already taken")?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                queue.drain_pending();
            }
        }
    }

    println!("\nShutting down...");
    state.reconciler.reset();
    state.gateway.sign_out().await?;
    queue.drain_pending();
    println!("Signed out.");
    Ok(())
}

fn print_collection(tabs: &[Tab]) {
    println!("-- {} active tab(s) --", tabs.len());
    for tab in tabs {
        println!(
            "  {:<8} {:<24} {}",
            tab.display_number(),
            tab.restaurant_name().unwrap_or("(unknown)"),
            format_currency(tab.total)
        );
    }
}
