//! Error types for configuration loading and validation

use std::path::PathBuf;
use thiserror::Error;
use validator::ValidationErrors;

/// Unified configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found error.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration validation error.
    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    /// Figment parsing error.
    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    for (path, error) in flatten(errors, String::new()) {
        let message = match &error.message {
            Some(msg) => msg.to_string(),
            None => error.code.to_string(),
        };
        let _ = writeln!(output, "Field '{}': {}", path, message);
    }
    output
}

/// Walks nested `#[validate(nested)]` sections so every leaf error is
/// reported with its dotted path.
fn flatten(
    errors: &ValidationErrors,
    prefix: String,
) -> Vec<(String, validator::ValidationError)> {
    use validator::ValidationErrorsKind;

    let mut out = Vec::new();
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().cloned().map(|e| (path.clone(), e)));
            }
            ValidationErrorsKind::Struct(inner) => out.extend(flatten(inner, path)),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    out.extend(flatten(inner, format!("{}[{}]", path, index)));
                }
            }
        }
    }
    out
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

