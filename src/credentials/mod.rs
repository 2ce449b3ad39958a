//! # Credential Store
//!
//! Per-account SCRAM verifiers and the read-mostly table that serves them.
//!
//! A [`CredentialRecord`] is the stored, text-encoded form of an account
//! (base64 salt, hex keys). [`UserCredentials`] is the decoded, validated form the
//! protocol works with. The [`UserCredentialsManager`] builds its table once from a
//! [`CredentialSource`] and answers lookups by normalized username.
//!
//! The password never appears here: only the salt, iteration count, stored key
//! and server key are kept.

pub mod manager;
pub mod source;

pub use manager::UserCredentialsManager;
pub use source::{CredentialSource, FileCredentialSource, StaticCredentialSource};

use crate::config::{KEY_LEN, MIN_ITERATIONS, SALT_LEN};
use crate::core::message::check_iterations;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::crypto::{derive_keys, normalize_username};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Decoded verifier material for one account
///
/// All buffers are owned copies; nothing aliases caller memory.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct UserCredentials {
    role: String,
    username: String,
    salt: [u8; SALT_LEN],
    iterations: u32,
    stored_key: [u8; KEY_LEN],
    server_key: [u8; KEY_LEN],
}

impl UserCredentials {
    /// Validate and copy credential fields.
    ///
    /// # Errors
    /// `ProtocolError::InvalidCredentialData` if any length is wrong, the
    /// iteration count is outside 4096..=9999, or the username normalizes to nothing.
    pub fn new(
        role: &str,
        username: &str,
        salt: &[u8],
        iterations: u32,
        stored_key: &[u8],
        server_key: &[u8],
    ) -> Result<Self> {
        let invalid = |msg: &str| ProtocolError::InvalidCredentialData(msg.to_string());

        let username = normalize_username(username)
            .map_err(|_| invalid(constants::ERR_EMPTY_USERNAME))?;
        let salt: [u8; SALT_LEN] = salt
            .try_into()
            .map_err(|_| invalid(constants::ERR_SALT_LENGTH))?;
        let stored_key: [u8; KEY_LEN] = stored_key
            .try_into()
            .map_err(|_| invalid(constants::ERR_STORED_KEY_LENGTH))?;
        let server_key: [u8; KEY_LEN] = server_key
            .try_into()
            .map_err(|_| invalid(constants::ERR_SERVER_KEY_LENGTH))?;
        let iterations =
            check_iterations(iterations).map_err(|_| invalid(constants::ERR_ITERATIONS_RANGE))?;

        Ok(Self {
            role: role.to_string(),
            username,
            salt,
            iterations,
            stored_key,
            server_key,
        })
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// The normalized username
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn stored_key(&self) -> &[u8; KEY_LEN] {
        &self.stored_key
    }

    pub fn server_key(&self) -> &[u8; KEY_LEN] {
        &self.server_key
    }
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("role", &self.role)
            .field("username", &self.username)
            .field("iterations", &self.iterations)
            .field("stored_key", &"<redacted>")
            .field("server_key", &"<redacted>")
            .finish()
    }
}

fn default_iterations() -> u32 {
    MIN_ITERATIONS
}

/// Stored, text-encoded form of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub role: String,
    pub username: String,
    /// Base64 (standard alphabet) salt
    pub salt: String,
    /// Records written before iteration counts were stored use 4096
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Hex stored key
    pub stored_key: String,
    /// Hex server key
    pub server_key: String,
}

impl CredentialRecord {
    /// Create the record for a new account from its password.
    ///
    /// This is the only place a password is turned into verifier material.
    pub fn from_password(
        role: &str,
        username: &str,
        password: &str,
        salt: &[u8; SALT_LEN],
        iterations: u32,
    ) -> Result<Self> {
        let iterations = check_iterations(iterations)?;
        let username = normalize_username(username)?;
        let keys = derive_keys(password, salt, iterations)?;

        Ok(Self {
            role: role.to_string(),
            username,
            salt: BASE64.encode(salt),
            iterations,
            stored_key: hex::encode(keys.stored_key()),
            server_key: hex::encode(keys.server_key()),
        })
    }

    /// Decode into validated credentials
    pub fn decode(&self) -> Result<UserCredentials> {
        let salt = BASE64.decode(self.salt.trim()).map_err(|e| {
            ProtocolError::InvalidCredentialData(format!("salt is not base64: {e}"))
        })?;
        let stored_key = hex::decode(self.stored_key.trim()).map_err(|e| {
            ProtocolError::InvalidCredentialData(format!("stored key is not hex: {e}"))
        })?;
        let server_key = hex::decode(self.server_key.trim()).map_err(|e| {
            ProtocolError::InvalidCredentialData(format!("server key is not hex: {e}"))
        })?;

        UserCredentials::new(
            &self.role,
            &self.username,
            &salt,
            self.iterations,
            &stored_key,
            &server_key,
        )
    }
}
