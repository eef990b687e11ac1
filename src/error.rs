use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrocerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("AI provider rejected the configured credentials")]
    ProviderAuth,

    #[error("AI provider quota exceeded")]
    ProviderQuota,

    #[error("AI provider error: {0}")]
    Provider(String),

    #[error("Recommendation parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let e = GrocerError::Validation("message is required".into());
        assert_eq!(e.to_string(), "Validation error: message is required");

        let e = GrocerError::Config("missing api key".into());
        assert_eq!(e.to_string(), "Config error: missing api key");

        let e = GrocerError::ProviderQuota;
        assert_eq!(e.to_string(), "AI provider quota exceeded");

        let e = GrocerError::Provider("upstream hiccup".into());
        assert_eq!(e.to_string(), "AI provider error: upstream hiccup");

        let e = GrocerError::RateLimited;
        assert_eq!(e.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let e: GrocerError = io_err.into();
        assert!(e.to_string().contains("not found"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{invalid").unwrap_err();
        let e: GrocerError = json_err.into();
        assert!(e.to_string().contains("JSON error"));
    }

    #[test]
    fn test_error_debug() {
        let e = GrocerError::ProviderAuth;
        let debug = format!("{:?}", e);
        assert!(debug.contains("ProviderAuth"));
    }
}
