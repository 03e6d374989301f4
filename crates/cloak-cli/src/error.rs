//! CLI error types.

use cloak_core::{MembershipError, SessionError};
use thiserror::Error;

/// Errors that end a `cloak` invocation.
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading or writing a file or stdout failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The member file or identifier was rejected
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),

    /// A session operation failed
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The identifier is not in the member set
    #[error("not a member: {id}")]
    NotAMember {
        /// The identifier that was looked up
        id: String,
    },

    /// A hex argument did not decode to the expected length
    #[error("invalid hex for {field}: {source}")]
    Hex {
        /// Argument name
        field: &'static str,
        /// Decoder error
        source: hex::FromHexError,
    },

    /// A proof could not be encoded
    #[error("cannot encode proof: {0}")]
    Encode(String),

    /// A proof file could not be decoded
    #[error("cannot decode proof: {0}")]
    Decode(String),
}

impl From<ciborium::ser::Error<std::io::Error>> for CliError {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for CliError {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Self::Decode(err.to_string())
    }
}
