use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Client input error: {0}")]
    ClientInput(String),

    #[error("Policy rejection: {0}")]
    PolicyRejection(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        GatewayError::Database(err.to_string())
    }
}

impl GatewayError {
    /// HTTP status the boundary answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::ClientInput(_) => 400,
            GatewayError::PolicyRejection(_) => 403,
            _ => 500,
        }
    }

    /// Message placed in the `error` field of the response body.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::ClientInput(msg) => msg.clone(),
            GatewayError::PolicyRejection(_) => {
                "Generated query contains a forbidden SQL command".to_string()
            }
            GatewayError::Llm(msg) => format!("Language model API error: {}", msg),
            GatewayError::Database(msg) => format!("Database error: {}", msg),
            other => format!("Server error: {}", other),
        }
    }

    /// Policy rejections are expected outcomes, not system faults.
    pub fn is_fault(&self) -> bool {
        !matches!(
            self,
            GatewayError::ClientInput(_) | GatewayError::PolicyRejection(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(GatewayError::ClientInput("x".into()).status_code(), 400);
        assert_eq!(GatewayError::PolicyRejection("x".into()).status_code(), 403);
        assert_eq!(GatewayError::Llm("x".into()).status_code(), 500);
        assert_eq!(GatewayError::Database("x".into()).status_code(), 500);
        assert_eq!(GatewayError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn messages_distinguish_database_from_model_faults() {
        let db = GatewayError::Database("connection refused".into()).client_message();
        let llm = GatewayError::Llm("quota exceeded".into()).client_message();
        assert!(db.starts_with("Database error"));
        assert!(llm.starts_with("Language model API error"));
        assert_ne!(db, llm);
    }

    #[test]
    fn rejection_is_not_a_fault() {
        assert!(!GatewayError::PolicyRejection("DROP".into()).is_fault());
        assert!(GatewayError::Database("boom".into()).is_fault());
    }
}
