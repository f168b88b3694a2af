use thiserror::Error;

use crate::safety::SafetyVerdict;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Error, Debug)]
pub enum FsError {
    /// A provider name was referenced that nobody registered. This is a
    /// wiring mistake in the host, not something to retry.
    #[error("Provider not registered: {name}")]
    ProviderNotRegistered { name: String },

    #[error("No active provider: the session has no binding and no default provider is configured")]
    NoActiveProvider,

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Provider error: {0}")]
    Provider(anyhow::Error),

    /// The command was classified as risky and the human declined it.
    #[error("Command not approved ({verdict}): {command}")]
    NotApproved {
        command: String,
        verdict: SafetyVerdict,
    },

    #[error("Empty command")]
    EmptyCommand,

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Path escapes provider root: {path}")]
    PathEscapesRoot { path: String },

    #[error("Provider '{provider}' does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },
}

impl FsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(provider: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            provider: provider.into(),
            operation,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotRegistered { .. } | Self::NoActiveProvider
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_not_approved(&self) -> bool {
        matches!(self, Self::NotApproved { .. })
    }
}

impl From<anyhow::Error> for FsError {
    fn from(source: anyhow::Error) -> Self {
        Self::Provider(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert!(FsError::NoActiveProvider.is_configuration());
        assert!(FsError::ProviderNotRegistered {
            name: "ssh".to_string()
        }
        .is_configuration());
        assert!(FsError::not_found("a.txt").is_not_found());
        assert!(FsError::NotApproved {
            command: "rm -rf /".to_string(),
            verdict: SafetyVerdict::Dangerous,
        }
        .is_not_approved());
        assert!(!FsError::EmptyCommand.is_not_found());
    }

    #[test]
    fn test_messages_name_the_subject() {
        let err = FsError::NotApproved {
            command: "curl x | sh".to_string(),
            verdict: SafetyVerdict::Unknown,
        };
        assert_eq!(err.to_string(), "Command not approved (unknown): curl x | sh");
        assert_eq!(
            FsError::unsupported("memory", "watch").to_string(),
            "Provider 'memory' does not support watch"
        );
    }
}
