//! # Handshake Messages
//!
//! The four messages exchanged during a login, each with a fixed byte layout.
//!
//! ## Wire Format
//! ```text
//! client-first  [username(N)] [','] [cNonce(30)]                                  N + 31
//! server-first  [cNonce(30)] [sNonce(30)] [','] [salt(24)] [",i="] [iters(4)]     92
//! client-final  [cNonce(30)] [sNonce(30)] [','] [proof(32)]                       93
//! server-final  [signature(32)] [','] [token(30)]                                 63
//! ```
//!
//! Every decoder checks the total length and each delimiter position before it
//! reads a field, so a structure is either fully populated or not produced at all.

use crate::config::{
    DELIMITER, ITERATION_DIGITS, ITERATION_MARKER, KEY_LEN, MAX_ITERATIONS, MIN_ITERATIONS,
    NONCE_LEN, SALT_LEN, TOKEN_LEN,
};
use crate::core::codec::{
    decode_hex, decode_reply, expect_delimiter, expect_len, read_array, MessageKind, WireMessage,
};
use crate::error::{ProtocolError, Result};
use crate::utils::crypto::normalize_username;

/// A per-handshake random value
pub type Nonce = [u8; NONCE_LEN];

/// Total length of a server-first message
pub const SERVER_FIRST_LEN: usize = 2 * NONCE_LEN + 1 + SALT_LEN + 3 + ITERATION_DIGITS;

/// Total length of a client-final message
pub const CLIENT_FINAL_LEN: usize = 2 * NONCE_LEN + 1 + KEY_LEN;

/// Length of the client-final prefix that goes into the auth message
pub const CLIENT_FINAL_WITHOUT_PROOF_LEN: usize = 2 * NONCE_LEN + 1;

/// Total length of a server-final message
pub const SERVER_FINAL_LEN: usize = KEY_LEN + 1 + TOKEN_LEN;

const SALT_OFFSET: usize = 2 * NONCE_LEN + 1;
const MARKER_OFFSET: usize = SALT_OFFSET + SALT_LEN;
const ITERATION_OFFSET: usize = MARKER_OFFSET + ITERATION_MARKER.len();

/// Check an iteration count against the accepted range
pub fn check_iterations(iterations: u32) -> Result<u32> {
    if (MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
        Ok(iterations)
    } else {
        Err(ProtocolError::InvalidIterationCount(iterations.to_string()))
    }
}

/// First message: who is logging in, plus the client nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFirstMessage {
    username: String,
    client_nonce: Nonce,
}

impl ClientFirstMessage {
    /// Build a client-first message, normalizing the username
    pub fn new(username: &str, client_nonce: Nonce) -> Result<Self> {
        Ok(Self {
            username: normalize_username(username)?,
            client_nonce,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn client_nonce(&self) -> &Nonce {
        &self.client_nonce
    }

    /// Decode from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        const KIND: MessageKind = MessageKind::ClientFirst;

        // At least one username byte
        if bytes.len() <= NONCE_LEN + 1 {
            return Err(ProtocolError::MalformedMessage(KIND));
        }
        let split = bytes.len() - NONCE_LEN - 1;
        expect_delimiter(KIND, bytes, split)?;

        let username = std::str::from_utf8(&bytes[..split])
            .map_err(|_| ProtocolError::MalformedMessage(KIND))?
            .to_string();
        let client_nonce = read_array::<NONCE_LEN>(KIND, bytes, split + 1)?;

        Ok(Self {
            username,
            client_nonce,
        })
    }

    /// Decode from the hex transport string
    pub fn from_hex(payload: &str) -> Result<Self> {
        Self::from_bytes(&decode_hex(Self::KIND, payload)?)
    }
}

impl WireMessage for ClientFirstMessage {
    const KIND: MessageKind = MessageKind::ClientFirst;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.username.len() + 1 + NONCE_LEN);
        out.extend_from_slice(self.username.as_bytes());
        out.push(DELIMITER);
        out.extend_from_slice(&self.client_nonce);
        out
    }
}

/// Second message: nonce echo, server nonce, and the account's salt parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFirstMessage {
    client_nonce: Nonce,
    server_nonce: Nonce,
    salt: [u8; SALT_LEN],
    iterations: u32,
}

impl ServerFirstMessage {
    pub fn new(
        client_nonce: Nonce,
        server_nonce: Nonce,
        salt: [u8; SALT_LEN],
        iterations: u32,
    ) -> Result<Self> {
        Ok(Self {
            client_nonce,
            server_nonce,
            salt,
            iterations: check_iterations(iterations)?,
        })
    }

    pub fn client_nonce(&self) -> &Nonce {
        &self.client_nonce
    }

    pub fn server_nonce(&self) -> &Nonce {
        &self.server_nonce
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Decode from raw bytes, requiring the echoed nonce to equal `expected_client_nonce`
    pub fn from_bytes(bytes: &[u8], expected_client_nonce: &Nonce) -> Result<Self> {
        const KIND: MessageKind = MessageKind::ServerFirst;

        expect_len(KIND, bytes, SERVER_FIRST_LEN)?;
        expect_delimiter(KIND, bytes, 2 * NONCE_LEN)?;
        if &bytes[MARKER_OFFSET..ITERATION_OFFSET] != ITERATION_MARKER {
            return Err(ProtocolError::MalformedMessage(KIND));
        }

        let iterations = parse_iterations(&bytes[ITERATION_OFFSET..])?;

        let client_nonce = read_array::<NONCE_LEN>(KIND, bytes, 0)?;
        if &client_nonce != expected_client_nonce {
            return Err(ProtocolError::NonceMismatch);
        }

        Ok(Self {
            client_nonce,
            server_nonce: read_array::<NONCE_LEN>(KIND, bytes, NONCE_LEN)?,
            salt: read_array::<SALT_LEN>(KIND, bytes, SALT_OFFSET)?,
            iterations,
        })
    }

    /// Decode a server reply, which may be a `'!'` error
    pub fn decode_reply(reply: &str, expected_client_nonce: &Nonce) -> Result<Self> {
        Self::from_bytes(&decode_reply(Self::KIND, reply)?, expected_client_nonce)
    }
}

impl WireMessage for ServerFirstMessage {
    const KIND: MessageKind = MessageKind::ServerFirst;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SERVER_FIRST_LEN);
        out.extend_from_slice(&self.client_nonce);
        out.extend_from_slice(&self.server_nonce);
        out.push(DELIMITER);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(ITERATION_MARKER);
        // The range check in `new` keeps this at exactly four digits
        out.extend_from_slice(format!("{:04}", self.iterations).as_bytes());
        out
    }
}

fn parse_iterations(digits: &[u8]) -> Result<u32> {
    if digits.len() != ITERATION_DIGITS || !digits.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::InvalidIterationCount(
            String::from_utf8_lossy(digits).into_owned(),
        ));
    }
    let value = digits
        .iter()
        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
    check_iterations(value)
}

/// Third message: both nonces and the client proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFinalMessage {
    client_nonce: Nonce,
    server_nonce: Nonce,
    client_proof: [u8; KEY_LEN],
}

impl ClientFinalMessage {
    pub fn new(client_nonce: Nonce, server_nonce: Nonce, client_proof: [u8; KEY_LEN]) -> Self {
        Self {
            client_nonce,
            server_nonce,
            client_proof,
        }
    }

    pub fn client_nonce(&self) -> &Nonce {
        &self.client_nonce
    }

    pub fn server_nonce(&self) -> &Nonce {
        &self.server_nonce
    }

    pub fn client_proof(&self) -> &[u8; KEY_LEN] {
        &self.client_proof
    }

    /// The part of a client-final that precedes the proof
    pub fn without_proof_bytes(client_nonce: &Nonce, server_nonce: &Nonce) -> Vec<u8> {
        let mut out = Vec::with_capacity(CLIENT_FINAL_LEN);
        out.extend_from_slice(client_nonce);
        out.extend_from_slice(server_nonce);
        out.push(DELIMITER);
        out
    }

    pub fn without_proof(&self) -> Vec<u8> {
        Self::without_proof_bytes(&self.client_nonce, &self.server_nonce)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        const KIND: MessageKind = MessageKind::ClientFinal;

        expect_len(KIND, bytes, CLIENT_FINAL_LEN)?;
        expect_delimiter(KIND, bytes, 2 * NONCE_LEN)?;

        Ok(Self {
            client_nonce: read_array::<NONCE_LEN>(KIND, bytes, 0)?,
            server_nonce: read_array::<NONCE_LEN>(KIND, bytes, NONCE_LEN)?,
            client_proof: read_array::<KEY_LEN>(KIND, bytes, CLIENT_FINAL_WITHOUT_PROOF_LEN)?,
        })
    }

    pub fn from_hex(payload: &str) -> Result<Self> {
        Self::from_bytes(&decode_hex(Self::KIND, payload)?)
    }
}

impl WireMessage for ClientFinalMessage {
    const KIND: MessageKind = MessageKind::ClientFinal;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.without_proof();
        out.extend_from_slice(&self.client_proof);
        out
    }
}

/// Fourth message: server signature and the issued token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFinalMessage {
    server_signature: [u8; KEY_LEN],
    token: String,
}

impl ServerFinalMessage {
    /// Build a server-final message; the token must be 30 printable ASCII characters
    pub fn new(server_signature: [u8; KEY_LEN], token: String) -> Result<Self> {
        if !is_valid_token(token.as_bytes()) {
            return Err(ProtocolError::MalformedMessage(MessageKind::ServerFinal));
        }
        Ok(Self {
            server_signature,
            token,
        })
    }

    pub fn server_signature(&self) -> &[u8; KEY_LEN] {
        &self.server_signature
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn into_token(self) -> String {
        self.token
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        const KIND: MessageKind = MessageKind::ServerFinal;

        expect_len(KIND, bytes, SERVER_FINAL_LEN)?;
        expect_delimiter(KIND, bytes, KEY_LEN)?;

        let token_bytes = &bytes[KEY_LEN + 1..];
        if !is_valid_token(token_bytes) {
            return Err(ProtocolError::MalformedMessage(KIND));
        }
        let token = String::from_utf8(token_bytes.to_vec())
            .map_err(|_| ProtocolError::MalformedMessage(KIND))?;

        Ok(Self {
            server_signature: read_array::<KEY_LEN>(KIND, bytes, 0)?,
            token,
        })
    }

    pub fn decode_reply(reply: &str) -> Result<Self> {
        Self::from_bytes(&decode_reply(Self::KIND, reply)?)
    }
}

impl WireMessage for ServerFinalMessage {
    const KIND: MessageKind = MessageKind::ServerFinal;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SERVER_FINAL_LEN);
        out.extend_from_slice(&self.server_signature);
        out.push(DELIMITER);
        out.extend_from_slice(self.token.as_bytes());
        out
    }
}

fn is_valid_token(bytes: &[u8]) -> bool {
    bytes.len() == TOKEN_LEN && bytes.iter().all(u8::is_ascii_graphic)
}
