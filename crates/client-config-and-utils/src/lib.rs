//! Core configuration and utilities for the OpenTab client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_APP_SCHEME, DEFAULT_LOG_LEVEL, DEFAULT_SUPABASE_ANON_KEY,
    DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
