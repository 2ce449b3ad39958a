//! # Core Protocol Components
//!
//! Message layouts and the hex codec they travel in.
//!
//! ## Components
//! - **Message**: the four handshake messages and their fixed byte layouts
//! - **Codec**: hex transport encoding and the `'!'` error-reply convention
//!
//! ## Security
//! - Every length and delimiter position is checked before a field is read
//! - Decoding untrusted input never panics; failures are typed errors

pub mod codec;
pub mod message;
