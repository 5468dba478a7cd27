//! Error type for the tabs REST surface.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabsApiError {
    /// The request never completed, or the response body was unreadable.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Tabs API returned {status}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

pub type TabsApiResult<T> = Result<T, TabsApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message_names_the_status() {
        let err = TabsApiError::Api {
            status: reqwest::StatusCode::FORBIDDEN,
            body: "row-level security".to_string(),
        };
        assert_eq!(err.to_string(), "Tabs API returned 403 Forbidden");
    }
}
