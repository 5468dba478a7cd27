pub mod connect;
pub mod login;
pub mod login_oauth;
pub mod reset_password;
pub mod signup;
pub mod watch;

use std::io::Write;

/// Read one trimmed line from stdin after printing a label.
pub(crate) fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Use the given value or prompt for it.
pub(crate) fn prompt_or(value: Option<String>, label: &str) -> anyhow::Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}
