//! OpenTab reference client.
//!
//! A terminal front end over the session engine and the realtime reconciler:
//! it signs in against the configured backend, connects to restaurants by
//! join code, and watches the active-tab collection update live.

mod app;
mod commands;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};

#[derive(Parser)]
#[command(name = "opentab-client")]
#[command(about = "OpenTab customer client: authentication and live tab watching")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        /// Email address (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
        /// Display name stored in the account metadata
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with email and password
    Login {
        /// Email address (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign in through an OAuth provider in an external browser
    LoginOauth {
        /// Provider name
        #[arg(default_value = "google")]
        provider: String,
    },
    /// Send a password reset email
    ResetPassword { email: String },
    /// Connect to a restaurant by join code and open a tab
    Connect { code: String },
    /// Sign in and watch the active tabs update live
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let paths = Paths::new()?;
    let config = Config::load(&paths)?;
    config.validate()?;

    let state = app::ClientState::bootstrap(config);

    match cli.command {
        Commands::Signup { email, name } => commands::signup::run(&state, email, name).await,
        Commands::Login { email } => commands::login::run(&state, email).await,
        Commands::LoginOauth { provider } => commands::login_oauth::run(&state, &provider).await,
        Commands::ResetPassword { email } => commands::reset_password::run(&state, &email).await,
        Commands::Connect { code } => commands::connect::run(&state, &code).await,
        Commands::Watch => commands::watch::run(&state).await,
    }
}
