//! Simulation backend wire types and form validation.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimCanvasError};
use crate::types::MessageId;

pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 10;

/// Body of `POST /api/simulations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub personality: String,
    pub background: String,
    pub rounds: u32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            personality: "adaptable and hardworking".into(),
            background: "a computer science graduate with 5 years of experience".into(),
            rounds: 5,
        }
    }
}

impl SimulationParams {
    /// Check every field and report all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.personality.trim().is_empty() {
            errors.push(FieldError::new("personality", "personality is required"));
        }
        if self.background.trim().is_empty() {
            errors.push(FieldError::new("background", "background is required"));
        }
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&self.rounds) {
            errors.push(FieldError::new(
                "rounds",
                format!("rounds must be between {MIN_ROUNDS} and {MAX_ROUNDS}"),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SimCanvasError::Validation(errors))
        }
    }
}

/// A single form field violation, rendered next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: MessageId,
    #[serde(default)]
    pub content: String,
}

/// Simulation state as returned by the REST endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(SimulationParams::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_field() {
        let params = SimulationParams {
            personality: "   ".into(),
            background: String::new(),
            rounds: 0,
        };
        let Err(SimCanvasError::Validation(errors)) = params.validate() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["personality", "background", "rounds"]);
    }

    #[test]
    fn test_rounds_bounds() {
        let mut params = SimulationParams::default();
        params.rounds = 1;
        assert!(params.validate().is_ok());
        params.rounds = 10;
        assert!(params.validate().is_ok());
        params.rounds = 11;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let resp: SimulationResponse =
            serde_json::from_str(r#"{"id":"sim-1","status":"running"}"#).unwrap();
        assert_eq!(resp.id, "sim-1");
        assert!(resp.chapters.is_empty());
        assert_eq!(resp.error, None);
    }

    #[test]
    fn test_response_full_shape() {
        let resp: SimulationResponse = serde_json::from_str(
            r#"{"id":"sim-1","status":"done","progress":100,
                "chapters":[{"number":1,"content":"Once"}],"error":null}"#,
        )
        .unwrap();
        assert_eq!(resp.progress, 100.0);
        assert_eq!(resp.chapters[0].number, MessageId::Number(1));
        assert_eq!(resp.chapters[0].content, "Once");
    }
}
