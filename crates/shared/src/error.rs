use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Transient,
    IllegalTransition,
    Internal,
}

/// Serializable error envelope handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_serializes_code_in_snake_case() {
        let err = ApiError::new(ErrorCode::IllegalTransition, "cannot edit from none");
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["code"], "illegal_transition");
        assert_eq!(json["message"], "cannot edit from none");
    }
}
