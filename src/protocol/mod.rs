//! # Login Protocol
//!
//! The stateful half of the crate: the server's two handshake steps and token
//! validation, the client that drives them, and the dispatcher that maps
//! operation names onto server calls.
//!
//! ## Flow
//! ```text
//! client                                 server
//!   | --- client-first  (hex) ----------->  |  pending entry created (60 s)
//!   | <-- server-first  (hex) ------------  |
//!   | --- client-final  (hex) ----------->  |  pending entry consumed, proof checked
//!   | <-- server-final  (hex) ------------  |  token issued (5 min, sliding)
//! ```
//! Any step may instead answer `'!'` followed by an error text.

pub mod client;
pub mod dispatcher;
pub mod pending;
pub mod server;
pub mod tokens;

use std::fmt;

/// The two wire operations a login server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ClientFirst,
    ClientFinal,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::ClientFirst => "client-first",
            Operation::ClientFinal => "client-final",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
