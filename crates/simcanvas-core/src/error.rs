use thiserror::Error;

use crate::simulation::FieldError;

#[derive(Debug, Error)]
pub enum SimCanvasError {
    #[error("Canvas with ID {0} not found")]
    NotFound(String),

    #[error("Canvas with ID {0} already exists")]
    Conflict(String),

    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, SimCanvasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = SimCanvasError::NotFound("canvas-1".into());
        assert_eq!(err.to_string(), "Canvas with ID canvas-1 not found");
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = SimCanvasError::Validation(vec![
            FieldError::new("personality", "required"),
            FieldError::new("rounds", "must be between 1 and 10"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: personality: required; rounds: must be between 1 and 10"
        );
    }

    #[test]
    fn test_http_message_carries_status() {
        let err = SimCanvasError::Http { status: 503 };
        assert!(err.to_string().contains("503"));
    }
}
