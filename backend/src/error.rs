//! Error types for the monitor.
//!
//! Every failure inside the live-feed pipeline is classified into one of the
//! variants below. None of them is allowed to terminate the feed connection:
//! callers log and drop (malformed payloads), retry (transport), or omit
//! (side effects, geocoding).

use std::fmt;

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Structured context for monitor errors.
///
/// Provides additional information about where and why an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "connect_feed", "fetch_history")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "quake_report", "geocode")
    pub entity: Option<String>,
    /// The entity ID if applicable (usually an event identity)
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether this error is retryable
    pub retryable: bool,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the entity ID.
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark this error as retryable.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for monitor operations
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Connection drops, HTTP failures, timeouts.
    /// These are recovered locally by reconnecting or omitting the result.
    #[error("Transport error: {message} {context}")]
    Transport {
        message: String,
        context: ErrorContext,
    },

    /// Unparseable JSON or a message missing its expected fields.
    #[error("Malformed payload: {message} {context}")]
    MalformedPayload {
        message: String,
        context: ErrorContext,
    },

    /// A well-formed message whose kind the monitor does not handle.
    #[error("Unsupported event: {message} {context}")]
    UnsupportedEvent {
        message: String,
        context: ErrorContext,
    },

    /// A sound, speech or geocode side effect failed.
    #[error("Side effect error: {message} {context}")]
    SideEffect {
        message: String,
        context: ErrorContext,
    },

    /// Persisted state could not be read or written.
    #[error("Storage error: {message} {context}")]
    Storage {
        message: String,
        context: ErrorContext,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Requested entity was not found.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// Internal/unexpected errors.
    #[error("Internal error: {message} {context}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

impl MonitorError {
    /// Create a transport error. Transport errors are retryable by default.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    /// Create a transport error with context.
    pub fn transport_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Transport {
            message: message.into(),
            context,
        }
    }

    /// Create a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a malformed payload error with context.
    pub fn malformed_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::MalformedPayload {
            message: message.into(),
            context,
        }
    }

    /// Create an unsupported event error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedEvent {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a side effect error.
    pub fn side_effect(message: impl Into<String>) -> Self {
        Self::SideEffect {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a side effect error with context.
    pub fn side_effect_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::SideEffect {
            message: message.into(),
            context,
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a storage error with context.
    pub fn storage_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Storage {
            message: message.into(),
            context,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a not found error with context.
    pub fn not_found_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { context, .. } => context.retryable,
            Self::Storage { context, .. } => context.retryable,
            Self::SideEffect { context, .. } => context.retryable,
            _ => false,
        }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Transport { context, .. } => context,
            Self::MalformedPayload { context, .. } => context,
            Self::UnsupportedEvent { context, .. } => context,
            Self::SideEffect { context, .. } => context,
            Self::Storage { context, .. } => context,
            Self::Configuration { context, .. } => context,
            Self::NotFound { context, .. } => context,
            Self::Internal { context, .. } => context,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::Transport { context, .. }
            | Self::MalformedPayload { context, .. }
            | Self::UnsupportedEvent { context, .. }
            | Self::SideEffect { context, .. }
            | Self::Storage { context, .. }
            | Self::Configuration { context, .. }
            | Self::NotFound { context, .. }
            | Self::Internal { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::malformed_with_context(
            err.to_string(),
            ErrorContext::default().with_details(format!("json_category={:?}", err.classify())),
        )
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::storage_with_context(
            err.to_string(),
            ErrorContext::default().with_details(format!("io_kind={:?}", err.kind())),
        )
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        let mut context = ErrorContext::default().retryable();
        if let Some(status) = err.status() {
            context = context.with_details(format!("status={}", status));
        }
        if let Some(url) = err.url() {
            context = context.with_entity_id(url.as_str());
        }
        MonitorError::transport_with_context(err.to_string(), context)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MonitorError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        MonitorError::transport_with_context(
            err.to_string(),
            ErrorContext::default().with_entity("websocket").retryable(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display_lists_present_fields() {
        let ctx = ErrorContext::new("fetch_history")
            .with_entity("quake_report")
            .with_entity_id("2024/01/01 16:10:00")
            .retryable();
        let text = ctx.to_string();
        assert!(text.contains("operation=fetch_history"));
        assert!(text.contains("entity=quake_report"));
        assert!(text.contains("id=2024/01/01 16:10:00"));
        assert!(text.contains("retryable=true"));
    }

    #[test]
    fn test_transport_is_retryable_by_default() {
        assert!(MonitorError::transport("socket reset").is_retryable());
        assert!(!MonitorError::malformed("bad json").is_retryable());
    }

    #[test]
    fn test_with_operation_overrides_context() {
        let err = MonitorError::storage("disk full").with_operation("write_marker");
        assert_eq!(err.context().operation.as_deref(), Some("write_marker"));
        assert!(err.to_string().starts_with("Storage error: disk full"));
    }

    #[test]
    fn test_json_error_maps_to_malformed() {
        let err: MonitorError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, MonitorError::MalformedPayload { .. }));
    }
}
