use thiserror::Error;

/// Errors returned by the order store and the order service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("Order validation error: {0}")]
    ValidationError(String),
    #[error("Order not found: {0}")]
    NotFound(i64),
    /// Storage failure. The message is a generic description; the backend
    /// detail is only written to the log.
    #[error("Order database error: {0}")]
    DatabaseError(String),
}

/// Coarse error class for callers that translate errors into transport codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Internal,
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::ValidationError(_) => ErrorKind::Validation,
            OrderError::NotFound(_) => ErrorKind::NotFound,
            OrderError::DatabaseError(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        OrderError::ValidationError(msg.into())
    }
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

pub type Result<T, E = OrderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_separate_validation_not_found_and_internal() {
        assert_eq!(OrderError::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(OrderError::NotFound(3).kind(), ErrorKind::NotFound);
        assert_eq!(
            OrderError::DatabaseError("failed to load orders".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(OrderError::NotFound(42).to_string(), "Order not found: 42");
        assert_eq!(
            OrderError::validation("user_id must be positive").to_string(),
            "Order validation error: user_id must be positive"
        );
    }
}
