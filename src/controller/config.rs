//! Controller configuration

use std::time::Duration;

use crate::error::ConfigError;

/// Default remote function for code redemption
pub const DEFAULT_FUNCTION_NAME: &str = "redeemBoxOfficeCode";

/// Default location of a user's redemption codes
pub const DEFAULT_PATH_TEMPLATE: &str = "users/{user}/redemption-codes";

/// Box-office controller configuration options
#[derive(Debug, Clone)]
pub struct BoxOfficeConfig {
    /// Name of the callable redemption function
    pub function_name: String,

    /// Feed path of a user's redemption codes; `{user}` is replaced by the user id
    pub path_template: String,

    /// Upper bound on a single redemption request
    pub request_timeout: Duration,
}

impl Default for BoxOfficeConfig {
    fn default() -> Self {
        Self {
            function_name: DEFAULT_FUNCTION_NAME.to_string(),
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BoxOfficeConfig {
    /// Set the callable function name
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = name.into();
        self
    }

    /// Set the redemption path template
    pub fn path_template(mut self, template: impl Into<String>) -> Self {
        self.path_template = template.into();
        self
    }

    /// Set the redemption request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check the configuration for values the controller cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.path_template.contains("{user}") {
            return Err(ConfigError::MissingUserPlaceholder(
                self.path_template.clone(),
            ));
        }
        if self.function_name.trim().is_empty() {
            return Err(ConfigError::EmptyFunctionName);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
