//! # Error Types
//!
//! Error handling for the SCRAM login protocol.
//!
//! Every failure that can happen while decoding a message, running one of the
//! two server steps, driving the client handshake, or loading credentials is a
//! [`ProtocolError`] variant. Nothing in the protocol path panics on untrusted input.
//!
//! ## Error Categories
//! - **Codec Errors**: malformed messages, nonce mismatch, bad iteration counts
//! - **Authentication Errors**: unknown user, failed proof, unknown or expired token
//! - **Resource Errors**: too many pending handshakes
//! - **Startup Errors**: credential source unreachable, invalid configuration
//!
//! ## Wire Messages
//! At the transport edge an error is written as `'!'` followed by the text from
//! [`ProtocolError::to_wire_message`]. `UnknownUser` and `ProofVerificationFailed`
//! produce the same text so a network observer cannot tell "no such account" from
//! "wrong password".
//!
//! ## Example Usage
//! ```rust
//! use scram_session::error::{ProtocolError, Result};
//! use tracing::{info, warn};
//!
//! fn check(token: Option<&str>) -> Result<&str> {
//!     token.ok_or(ProtocolError::NotAuthenticated)
//! }
//!
//! match check(None) {
//!     Ok(token) => info!(token, "Have a token"),
//!     Err(e) => warn!(error = %e, "No session"),
//! }
//! ```

use crate::core::codec::MessageKind;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Text sent on the wire for each rejected request
    pub const WIRE_TOO_MANY_PENDING: &str = "Too many pending requests";
    pub const WIRE_INVALID_LOGIN: &str = "Invalid login";
    pub const WIRE_NO_MATCHING_FIRST: &str = "client-final without matching client-first";
    pub const WIRE_INVALID_CLIENT_FIRST: &str = "Invalid client-first message";
    pub const WIRE_INVALID_CLIENT_FINAL: &str = "Invalid client-final message";
    pub const WIRE_INVALID_TOKEN: &str = "Invalid token";
    pub const WIRE_UNKNOWN_OPERATION: &str = "Unknown operation";
    pub const WIRE_INTERNAL_ERROR: &str = "Internal server error";

    /// Synchronization errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Time errors
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";

    /// Crypto errors
    pub const ERR_RANDOM_SOURCE: &str = "Operating system random source failed";
    pub const ERR_HMAC_KEY: &str = "HMAC key rejected";

    /// Credential errors
    pub const ERR_SALT_LENGTH: &str = "Salt must be 24 bytes";
    pub const ERR_STORED_KEY_LENGTH: &str = "Stored key must be 32 bytes";
    pub const ERR_SERVER_KEY_LENGTH: &str = "Server key must be 32 bytes";
    pub const ERR_ITERATIONS_RANGE: &str = "Iteration count must be in 4096..=9999";
    pub const ERR_EMPTY_USERNAME: &str = "Username is empty after normalization";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid {0} message")]
    MalformedMessage(MessageKind),

    #[error("Nonce in server-first message does not match the client nonce")]
    NonceMismatch,

    #[error("Invalid iteration count: {0}")]
    InvalidIterationCount(String),

    #[error("Unknown user")]
    UnknownUser,

    #[error("Client proof verification failed")]
    ProofVerificationFailed,

    #[error("Too many pending requests")]
    TooManyPendingRequests,

    #[error("client-final without matching client-first")]
    NoMatchingPendingRequest,

    #[error("Expired or unknown token")]
    ExpiredOrUnknownToken,

    #[error("Username is empty after normalization")]
    InvalidUsername,

    #[error("Invalid credential data: {0}")]
    InvalidCredentialData(String),

    #[error("Credential source error: {0}")]
    CredentialSource(String),

    #[error("Server rejected request: {0}")]
    ServerRejected(String),

    #[error("Server signature did not match")]
    ServerSignatureMismatch,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Text written after the `'!'` marker when this error is returned over the wire.
    ///
    /// Login failures collapse to one message regardless of which check failed.
    pub fn to_wire_message(&self) -> &'static str {
        match self {
            ProtocolError::TooManyPendingRequests => constants::WIRE_TOO_MANY_PENDING,
            ProtocolError::UnknownUser | ProtocolError::ProofVerificationFailed => {
                constants::WIRE_INVALID_LOGIN
            }
            ProtocolError::NoMatchingPendingRequest => constants::WIRE_NO_MATCHING_FIRST,
            ProtocolError::MalformedMessage(MessageKind::ClientFinal) => {
                constants::WIRE_INVALID_CLIENT_FINAL
            }
            ProtocolError::MalformedMessage(MessageKind::ClientFirst)
            | ProtocolError::InvalidUsername => constants::WIRE_INVALID_CLIENT_FIRST,
            ProtocolError::ExpiredOrUnknownToken => constants::WIRE_INVALID_TOKEN,
            _ => constants::WIRE_INTERNAL_ERROR,
        }
    }

    /// Map the text of a `'!'` reply back to a typed error.
    pub fn from_wire_message(message: &str) -> Self {
        match message {
            constants::WIRE_TOO_MANY_PENDING => ProtocolError::TooManyPendingRequests,
            constants::WIRE_NO_MATCHING_FIRST => ProtocolError::NoMatchingPendingRequest,
            constants::WIRE_INVALID_TOKEN => ProtocolError::ExpiredOrUnknownToken,
            other => ProtocolError::ServerRejected(other.to_string()),
        }
    }

    /// True when the server no longer recognizes the session token.
    pub fn is_token_invalidated(&self) -> bool {
        matches!(self, ProtocolError::ExpiredOrUnknownToken)
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
