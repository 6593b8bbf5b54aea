//! Internal primitive codec used by flatsat containers.
//!
//! Everything flatsat persists is built from the scalars, strings, byte blobs and sequences
//! provided here. The functions come in `write_*`/`read_*` pairs. Writers only fail when the
//! underlying [`Write`](std::io::Write) fails, readers report malformed input as [`CodecError`].
use std::io;

use thiserror::Error;

pub mod primitives;

mod vli_enc;

pub use primitives::*;

/// Largest sequence, string or blob length accepted while reading.
///
/// Declared lengths come from untrusted input, so they are bounded before anything is allocated.
pub const MAX_SEQUENCE_LEN: u64 = 1 << 31;

/// Possible errors while decoding primitive values.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    #[error("Error reading input: {}", cause)]
    Io {
        #[source]
        cause: io::Error,
    },
    #[error("Encoded integer does not fit into {}", target)]
    IntegerOverflow { target: &'static str },
    #[error("Invalid boolean value {}", value)]
    InvalidBool { value: u8 },
    #[error("String is not valid UTF-8")]
    InvalidUtf8,
    #[error("Declared length {} exceeds the limit of {}", len, MAX_SEQUENCE_LEN)]
    LengthLimit { len: u64 },
    #[error("{0}")]
    Invalid(String),
}

impl From<io::Error> for CodecError {
    fn from(cause: io::Error) -> CodecError {
        if cause.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::UnexpectedEnd
        } else {
            CodecError::Io { cause }
        }
    }
}

/// Declares consecutive integer constants used as type tags in an encoding.
///
/// The order of names defines the wire values, so names may only ever be appended.
#[macro_export]
macro_rules! tag_codes {
    ($counter:expr, $name:ident, ) => {
        const $name: u64 = $counter;
    };
    ($counter:expr, $name:ident, $($names:ident),* ,) => {
        const $name: u64 = $counter;
        $crate::tag_codes!($counter + 1, $($names),* ,);
    };
}
