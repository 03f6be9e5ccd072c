use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid fragment: {0}")]
    Validation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("A node named '{0}' already exists")]
    DuplicateName(String),

    #[error("Node name must not be empty")]
    EmptyName,

    #[error("Unknown color palette: {0}")]
    UnknownPalette(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("No conversation is active")]
    NoActiveConversation,

    #[error("Response for conversation {requested} arrived after switching to {current}")]
    StaleResponse { requested: String, current: String },

    #[error("Ticket was issued for a {expected} request, got a {actual} response")]
    TicketMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Whether the error comes from a generation/quiz round trip that the
    /// user should see as a generic "failed to generate" notice.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, GraphError::Validation(_))
    }

    /// The text shown to the user. Malformed service responses collapse to
    /// one generic notice; the detail goes to the log.
    pub fn public_message(&self) -> String {
        if self.is_generation_failure() {
            tracing::warn!(error = %self, "service response rejected");
            GENERATION_FAILED.to_string()
        } else {
            self.to_string()
        }
    }
}

pub const GENERATION_FAILED: &str = "Failed to generate a response. Please try again.";

#[cfg(feature = "napi")]
impl From<GraphError> for napi::Error {
    fn from(e: GraphError) -> Self {
        napi::Error::from_reason(e.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failures_get_generic_message() {
        let err = GraphError::Validation("node 0 is missing 'info'".into());
        assert!(err.is_generation_failure());
        assert_eq!(err.public_message(), GENERATION_FAILED);
    }

    #[test]
    fn test_other_errors_keep_their_detail() {
        let err = GraphError::StaleResponse {
            requested: "c1".into(),
            current: "c2".into(),
        };
        assert!(!err.is_generation_failure());
        assert!(err.public_message().contains("c1"));
        assert_eq!(GraphError::EmptyName.public_message(), "Node name must not be empty");
    }
}
