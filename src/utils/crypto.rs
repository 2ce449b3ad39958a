//! SCRAM-SHA-256 primitives
//!
//! ```text
//! SaltedPassword  = PBKDF2-HMAC-SHA256(password, salt, i, 32)
//! ClientKey       = HMAC(SaltedPassword, "Client Key")
//! StoredKey       = SHA-256(ClientKey)
//! ServerKey       = HMAC(SaltedPassword, "Server Key")
//! ClientSignature = HMAC(StoredKey, AuthMessage)
//! ClientProof     = ClientKey XOR ClientSignature
//! ServerSignature = HMAC(ServerKey, AuthMessage)
//! ```
//!
//! `AuthMessage` is client-first ‖ server-first ‖ client-final-without-proof, so a
//! proof only verifies against the exact transcript it was computed for.

use crate::config::{KEY_LEN, NONCE_LEN, SALT_LEN, TOKEN_LEN};
use crate::core::message::Nonce;
use crate::error::{constants, ProtocolError, Result};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

type HmacSha256 = Hmac<Sha256>;

const CLIENT_KEY_LABEL: &[u8] = b"Client Key";
const SERVER_KEY_LABEL: &[u8] = b"Server Key";

/// Canonicalize a username: trim, fold full-width ASCII forms, lowercase.
///
/// # Errors
/// Returns `ProtocolError::InvalidUsername` when nothing is left.
pub fn normalize_username(username: &str) -> Result<String> {
    let normalized: String = username
        .trim()
        .chars()
        .map(fold_width)
        .flat_map(char::to_lowercase)
        .collect();

    if normalized.is_empty() {
        return Err(ProtocolError::InvalidUsername);
    }
    Ok(normalized)
}

/// Map U+FF01..=U+FF5E onto printable ASCII and the ideographic space onto ' '
fn fold_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3000}' => ' ',
        _ => c,
    }
}

/// Compute HMAC-SHA256
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; KEY_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| ProtocolError::Crypto(constants::ERR_HMAC_KEY.into()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Compute SHA-256
pub fn sha256(data: &[u8]) -> [u8; KEY_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Stretch a password with PBKDF2-HMAC-SHA256
pub fn salted_password(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut *out);
    out
}

/// Keys derived from a password; the client key is wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    client_key: [u8; KEY_LEN],
    stored_key: [u8; KEY_LEN],
    server_key: [u8; KEY_LEN],
}

impl DerivedKeys {
    pub fn client_key(&self) -> &[u8; KEY_LEN] {
        &self.client_key
    }

    pub fn stored_key(&self) -> &[u8; KEY_LEN] {
        &self.stored_key
    }

    pub fn server_key(&self) -> &[u8; KEY_LEN] {
        &self.server_key
    }
}

/// Derive client, stored and server keys for a (password, salt, iterations) triple
pub fn derive_keys(password: &str, salt: &[u8], iterations: u32) -> Result<DerivedKeys> {
    let salted = salted_password(password, salt, iterations);
    let client_key = hmac_sha256(&*salted, CLIENT_KEY_LABEL)?;
    let server_key = hmac_sha256(&*salted, SERVER_KEY_LABEL)?;

    Ok(DerivedKeys {
        stored_key: sha256(&client_key),
        client_key,
        server_key,
    })
}

/// Concatenate the transcript that proofs and signatures are computed over
pub fn auth_message(
    client_first: &[u8],
    server_first: &[u8],
    client_final_without_proof: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        client_first.len() + server_first.len() + client_final_without_proof.len(),
    );
    out.extend_from_slice(client_first);
    out.extend_from_slice(server_first);
    out.extend_from_slice(client_final_without_proof);
    out
}

fn xor(a: &[u8; KEY_LEN], b: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

/// ClientProof = ClientKey XOR HMAC(StoredKey, AuthMessage)
pub fn client_proof(
    client_key: &[u8; KEY_LEN],
    stored_key: &[u8; KEY_LEN],
    auth_message: &[u8],
) -> Result<[u8; KEY_LEN]> {
    let signature = Zeroizing::new(hmac_sha256(stored_key, auth_message)?);
    Ok(xor(client_key, &signature))
}

/// Server-side proof check.
///
/// Recovers the candidate client key from the proof and accepts iff its digest
/// equals the stored key, compared in constant time.
pub fn verify_proof(
    stored_key: &[u8; KEY_LEN],
    proof: &[u8; KEY_LEN],
    auth_message: &[u8],
) -> Result<bool> {
    let signature = Zeroizing::new(hmac_sha256(stored_key, auth_message)?);
    let candidate = Zeroizing::new(xor(proof, &signature));
    Ok(sha256(&*candidate)[..].ct_eq(&stored_key[..]).into())
}

/// ServerSignature = HMAC(ServerKey, AuthMessage)
pub fn server_signature(server_key: &[u8; KEY_LEN], auth_message: &[u8]) -> Result<[u8; KEY_LEN]> {
    hmac_sha256(server_key, auth_message)
}

/// Constant-time comparison of two signatures
pub fn signatures_match(expected: &[u8; KEY_LEN], received: &[u8; KEY_LEN]) -> bool {
    expected[..].ct_eq(&received[..]).into()
}

fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::fill(buf)
        .map_err(|e| ProtocolError::Crypto(format!("{}: {e}", constants::ERR_RANDOM_SOURCE)))
}

/// Generate a cryptographically secure random nonce
pub fn generate_nonce() -> Result<Nonce> {
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;
    Ok(nonce)
}

/// Generate a fresh per-account salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt)?;
    Ok(salt)
}

/// Generate an opaque alphanumeric session token
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
