//! Error types for the blockdex pipeline.

use thiserror::Error;

/// Errors that can occur while scheduling, fetching or storing blocks.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Chain tip went backwards: previously observed #{previous}, node now reports #{current}")]
    TipRegressed { previous: u64, current: u64 },

    #[error("Decode error ({context}): {reason}")]
    Decode { context: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed numeric literal {literal:?} in field '{field}'")]
    Numeric { field: String, literal: String },

    #[error("Indexer aborted: {reason}")]
    Aborted { reason: String },

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to pick a process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Missing or invalid endpoint, credentials or settings.
    Config,
    /// Node or store unreachable.
    Connectivity,
    /// A collaborator answered with something the core cannot trust.
    Protocol,
    /// Anything else (internal failure).
    Software,
}

impl FailureClass {
    /// sysexits(3)-style exit status for this class.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Config => 78,       // EX_CONFIG
            Self::Connectivity => 69, // EX_UNAVAILABLE
            Self::Protocol => 76,     // EX_PROTOCOL
            Self::Software => 70,     // EX_SOFTWARE
        }
    }
}

impl IndexerError {
    /// Build a decode error with some context (a height, a sequence number, a field).
    pub fn decode(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// The failure class of this error.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Config(_) => FailureClass::Config,
            Self::Rpc(_) | Self::Storage(_) => FailureClass::Connectivity,
            Self::Protocol(_) | Self::TipRegressed { .. } | Self::Decode { .. } | Self::Numeric { .. } => {
                FailureClass::Protocol
            }
            Self::Aborted { .. } | Self::Other(_) => FailureClass::Software,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classes_map_to_distinct_exit_codes() {
        assert_eq!(IndexerError::Config("missing database".into()).class().exit_code(), 78);
        assert_eq!(IndexerError::Rpc("connection refused".into()).class().exit_code(), 69);
        assert_eq!(IndexerError::Storage("pool timed out".into()).class().exit_code(), 69);
        assert_eq!(
            IndexerError::TipRegressed { previous: 10, current: 9 }.class().exit_code(),
            76
        );
        assert_eq!(IndexerError::Other("boom".into()).class().exit_code(), 70);
    }

    #[test]
    fn decode_error_keeps_context() {
        let err = IndexerError::decode("height 42", "unexpected end of input");
        assert_eq!(err.to_string(), "Decode error (height 42): unexpected end of input");
    }
}
