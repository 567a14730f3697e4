//! Common utilities for the greenmap service

pub mod config;
pub mod credentials;
pub mod error;

pub use config::AppConfig;
pub use credentials::Credentials;
pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use crate::error::suggest_correction;

    #[test]
    fn suggest_correction_returns_expected_layer() {
        let layers = ["buffers".to_string(), "spaces".to_string()];
        assert_eq!(
            suggest_correction("bufers", &layers),
            Some("buffers".to_string())
        );
    }
}
