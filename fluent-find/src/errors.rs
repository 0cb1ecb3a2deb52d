use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Root element not found: {0}")]
    RootNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Element is detached from the tree: {0}")]
    ElementDetached(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
