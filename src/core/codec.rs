//! # Hex Transport Codec
//!
//! Messages travel as lowercase hexadecimal strings, two characters per byte and
//! no separators. Incoming payloads are accepted in either case.
//!
//! A reply that starts with `'!'` is a protocol-level error; the rest of the
//! string is the message text and is never decoded as hex.

use crate::config::ERROR_PREFIX;
use crate::error::{ProtocolError, Result};
use std::fmt;

/// Identifies one of the four handshake messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ClientFirst,
    ServerFirst,
    ClientFinal,
    ServerFinal,
}

impl MessageKind {
    /// Get the wire name of the message
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::ClientFirst => "client-first",
            MessageKind::ServerFirst => "server-first",
            MessageKind::ClientFinal => "client-final",
            MessageKind::ServerFinal => "server-final",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A handshake message with a fixed byte layout
pub trait WireMessage: Sized {
    /// Which message this is
    const KIND: MessageKind;

    /// Serialize to the raw byte layout
    fn to_bytes(&self) -> Vec<u8>;

    /// Serialize to the hex transport string
    fn to_hex(&self) -> String {
        encode_hex(&self.to_bytes())
    }
}

/// Encode bytes as lowercase hex
#[inline]
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex payload, reporting failures against `kind`
pub fn decode_hex(kind: MessageKind, payload: &str) -> Result<Vec<u8>> {
    hex::decode(payload).map_err(|_| ProtocolError::MalformedMessage(kind))
}

/// Decode a server reply, turning a `'!'` reply into its error
pub fn decode_reply(kind: MessageKind, reply: &str) -> Result<Vec<u8>> {
    if let Some(message) = reply.strip_prefix(ERROR_PREFIX) {
        return Err(ProtocolError::from_wire_message(message));
    }
    decode_hex(kind, reply)
}

/// Render an error in the `'!'` reply convention
pub fn error_reply(err: &ProtocolError) -> String {
    let message = err.to_wire_message();
    let mut reply = String::with_capacity(message.len() + 1);
    reply.push(ERROR_PREFIX);
    reply.push_str(message);
    reply
}

/// Copy a fixed-size field out of an already length-checked buffer
pub(crate) fn read_array<const N: usize>(
    kind: MessageKind,
    bytes: &[u8],
    offset: usize,
) -> Result<[u8; N]> {
    bytes
        .get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(ProtocolError::MalformedMessage(kind))
}

/// Check that the delimiter sits where the layout puts it
pub(crate) fn expect_delimiter(kind: MessageKind, bytes: &[u8], offset: usize) -> Result<()> {
    match bytes.get(offset) {
        Some(&crate::config::DELIMITER) => Ok(()),
        _ => Err(ProtocolError::MalformedMessage(kind)),
    }
}

/// Check the exact length of a fixed-size message
#[inline]
pub(crate) fn expect_len(kind: MessageKind, bytes: &[u8], len: usize) -> Result<()> {
    if bytes.len() == len {
        Ok(())
    } else {
        Err(ProtocolError::MalformedMessage(kind))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_unseparated() {
        assert_eq!(encode_hex(&[0x00, 0xAB, 0x10, 0xff]), "00ab10ff");
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let bytes = decode_hex(MessageKind::ClientFirst, "00AB10Ff").unwrap();
        assert_eq!(bytes, vec![0x00, 0xab, 0x10, 0xff]);
    }

    #[test]
    fn odd_length_or_bad_digit_is_malformed() {
        for payload in ["abc", "zz", "0g"] {
            match decode_hex(MessageKind::ClientFinal, payload) {
                Err(ProtocolError::MalformedMessage(MessageKind::ClientFinal)) => {}
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn bang_reply_is_never_hex_decoded() {
        match decode_reply(MessageKind::ServerFirst, "!Invalid login") {
            Err(ProtocolError::ServerRejected(msg)) => assert_eq!(msg, "Invalid login"),
            other => panic!("unexpected {other:?}"),
        }
        // "!00" would be valid hex after the marker but must still be an error
        assert!(decode_reply(MessageKind::ServerFirst, "!00").is_err());
    }

    #[test]
    fn error_reply_uses_bang_prefix() {
        let reply = error_reply(&ProtocolError::TooManyPendingRequests);
        assert_eq!(reply, "!Too many pending requests");
    }

    #[test]
    fn read_array_rejects_short_buffer() {
        let bytes = [1u8, 2, 3];
        assert!(read_array::<4>(MessageKind::ServerFinal, &bytes, 0).is_err());
        assert_eq!(
            read_array::<2>(MessageKind::ServerFinal, &bytes, 1).unwrap(),
            [2, 3]
        );
    }
}
