use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Registry operation that produced an error, for logs and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Read,
    Image,
    Compare,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::List => "list",
            Operation::Read => "read",
            Operation::Image => "image",
            Operation::Compare => "compare",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transport,
    Decode,
    Service,
    Validation,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{operation}: could not reach registry: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation}: malformed registry response: {reason}")]
    Decode { operation: Operation, reason: String },
    #[error("{operation}: registry response exceeds {limit} bytes")]
    TooLarge { operation: Operation, limit: usize },
    #[error("{operation}: registry returned {code}: {message}")]
    Service {
        operation: Operation,
        code: u16,
        message: String,
    },
    #[error("no person with id {user_id:?}")]
    NotFound { user_id: String },
    #[error("missing required field: {field}")]
    Validation { field: &'static str },
    #[error("cannot read image {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    pub fn class(&self) -> FailureClass {
        match self {
            RegistryError::Transport { .. } => FailureClass::Transport,
            RegistryError::Decode { .. } | RegistryError::TooLarge { .. } => {
                FailureClass::Decode
            }
            RegistryError::Service { .. } | RegistryError::NotFound { .. } => {
                FailureClass::Service
            }
            RegistryError::Validation { .. } | RegistryError::Attachment { .. } => {
                FailureClass::Validation
            }
        }
    }

    /// Service status code, when the registry answered with one.
    pub fn code(&self) -> Option<u16> {
        match self {
            RegistryError::Service { code, .. } => Some(*code),
            RegistryError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// Failure constructing a registry client.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid registry base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_mapping() {
        let err = RegistryError::NotFound { user_id: "9".into() };
        assert_eq!(err.class(), FailureClass::Service);
        assert_eq!(err.code(), Some(404));

        let err = RegistryError::Validation { field: "user_id" };
        assert_eq!(err.class(), FailureClass::Validation);
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "missing required field: user_id");

        let err = RegistryError::Decode {
            operation: Operation::Compare,
            reason: "expected value".into(),
        };
        assert_eq!(err.class(), FailureClass::Decode);
        assert!(err.to_string().starts_with("compare: malformed"));

        let err = RegistryError::TooLarge {
            operation: Operation::Image,
            limit: 1024,
        };
        assert_eq!(err.class(), FailureClass::Decode);
        assert_eq!(err.to_string(), "image: registry response exceeds 1024 bytes");
    }

    #[test]
    fn test_service_error_message() {
        let err = RegistryError::Service {
            operation: Operation::Create,
            code: 409,
            message: "user exists".into(),
        };
        assert_eq!(err.class(), FailureClass::Service);
        assert_eq!(err.code(), Some(409));
        assert_eq!(err.to_string(), "create: registry returned 409: user exists");
    }
}
