//! Errors of the serialization API.
use std::io;

use thiserror::Error;

use flatsat_internal_codec::CodecError;

use crate::ident::NodeId;
use crate::payload::PayloadTag;

/// Possible errors while serializing or deserializing.
///
/// Every error is terminal for the call that returned it, no partially restored value is kept.
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("Node {} has kind '{}' which cannot be deserialized", id, tag)]
    UnsupportedNodeKind { id: NodeId, tag: &'static str },
    #[error("Clause reference {} outside of the clause pool of size {}", id, pool_size)]
    DanglingClauseReference { id: i64, pool_size: usize },
    #[error("No decoder registered for payload tag {}", tag)]
    UnregisteredPayloadType { tag: PayloadTag },
    #[error("Malformed container: {0}")]
    MalformedContainer(#[from] CodecError),
    #[error("Decoding payload with tag {} failed: {}", tag, cause)]
    PayloadDecode { tag: PayloadTag, cause: anyhow::Error },
    #[error("A {0} references a clause that is neither an original nor a learned clause")]
    UnpooledClause(&'static str),
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl SerialError {
    /// Shortcut for structural problems found while decoding.
    pub(crate) fn malformed(message: impl Into<String>) -> SerialError {
        SerialError::MalformedContainer(CodecError::Invalid(message.into()))
    }
}

impl From<io::Error> for SerialError {
    fn from(err: io::Error) -> SerialError {
        SerialError::Io(err)
    }
}
