//! Custom validation functions for configuration.

use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

static LOG_FILTER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_:\-]+(=[A-Za-z]+)?(,[A-Za-z0-9_:\-]+(=[A-Za-z]+)?)*$").ok()
});

/// Validate a `tracing` filter directive such as `info` or
/// `kanal_core=trace,warn`.
pub fn validate_log_filter(filter: &str) -> Result<(), ValidationError> {
    let re = LOG_FILTER
        .as_ref()
        .ok_or_else(|| ValidationError::new("invalid_regex"))?;
    if re.is_match(filter) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_filter"))
    }
}
