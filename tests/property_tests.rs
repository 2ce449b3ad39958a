//! Property-based tests using proptest
//!
//! Decoders see untrusted input, so the properties here focus on "never
//! panics, always a typed error", on every message decoding back to itself,
//! and on the proof check rejecting any change.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use scram_session::core::codec::{error_reply, WireMessage};
use scram_session::core::message::{
    ClientFinalMessage, ClientFirstMessage, ServerFinalMessage, ServerFirstMessage,
};
use scram_session::error::ProtocolError;
use scram_session::utils::crypto::{client_proof, sha256, verify_proof};

// Property: no decoder panics on arbitrary text
proptest! {
    #[test]
    fn prop_decoders_never_panic(payload in ".{0,300}") {
        let _ = ClientFirstMessage::from_hex(&payload);
        let _ = ServerFirstMessage::decode_reply(&payload, &[0; 30]);
        let _ = ClientFinalMessage::from_hex(&payload);
        let _ = ServerFinalMessage::decode_reply(&payload);
    }
}

// Property: no decoder panics on arbitrary well-formed hex
proptest! {
    #[test]
    fn prop_decoders_never_panic_on_hex(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
        let payload = hex::encode(&bytes);
        let _ = ClientFirstMessage::from_hex(&payload);
        let _ = ServerFirstMessage::decode_reply(&payload, &[0; 30]);
        let _ = ClientFinalMessage::from_hex(&payload);
        let _ = ServerFinalMessage::decode_reply(&payload);
    }
}

// Property: client-final decoding accepts exactly 93 bytes
proptest! {
    #[test]
    fn prop_client_final_length_is_exact(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
        let decoded = ClientFinalMessage::from_hex(&hex::encode(&bytes));
        let well_formed = bytes.len() == 93 && bytes[60] == b',';
        prop_assert_eq!(decoded.is_ok(), well_formed);
    }
}

// Property: the username survives encoding, commas included
proptest! {
    #[test]
    fn prop_client_first_preserves_username(
        username in "[a-z0-9._,-]{1,40}",
        nonce in prop::array::uniform30(any::<u8>()),
    ) {
        let message = ClientFirstMessage::new(&username, nonce).expect("valid username");
        let decoded = ClientFirstMessage::from_hex(&message.to_hex()).expect("decodes");
        prop_assert_eq!(decoded.username(), username.as_str());
        prop_assert_eq!(decoded.client_nonce(), &nonce);
    }
}

// Property: only 4096..=9999 is an acceptable iteration count
proptest! {
    #[test]
    fn prop_iteration_range(iterations in 0u32..20_000) {
        let built = ServerFirstMessage::new([1; 30], [2; 30], [3; 24], iterations);
        prop_assert_eq!(built.is_ok(), (4096..=9999).contains(&iterations));
    }
}

// Property: the server-first echo must match the client's nonce
proptest! {
    #[test]
    fn prop_server_first_nonce_echo(
        sent in prop::array::uniform30(any::<u8>()),
        echoed in prop::array::uniform30(any::<u8>()),
    ) {
        let reply = ServerFirstMessage::new(echoed, [9; 30], [3; 24], 4096).unwrap().to_hex();
        let decoded = ServerFirstMessage::decode_reply(&reply, &sent);
        if sent == echoed {
            let decoded = decoded.unwrap();
            prop_assert_eq!(decoded.client_nonce(), &sent);
        } else {
            prop_assert!(matches!(decoded, Err(ProtocolError::NonceMismatch)));
        }
    }
}

// Property: any single-bit change to a proof is rejected
proptest! {
    #[test]
    fn prop_tampered_proof_rejected(
        client_key in prop::array::uniform32(any::<u8>()),
        auth in prop::collection::vec(any::<u8>(), 1..200),
        index in 0usize..32,
        bit in 0u8..8,
    ) {
        let stored_key = sha256(&client_key);
        let mut proof = client_proof(&client_key, &stored_key, &auth).unwrap();
        prop_assert!(verify_proof(&stored_key, &proof, &auth).unwrap());

        proof[index] ^= 1 << bit;
        prop_assert!(!verify_proof(&stored_key, &proof, &auth).unwrap());
    }
}

// Property: every error reply is '!'-prefixed and decodes back to an error
proptest! {
    #[test]
    fn prop_error_replies_decode_as_errors(which in 0usize..6) {
        let errors = [
            ProtocolError::TooManyPendingRequests,
            ProtocolError::UnknownUser,
            ProtocolError::ProofVerificationFailed,
            ProtocolError::NoMatchingPendingRequest,
            ProtocolError::ExpiredOrUnknownToken,
            ProtocolError::Timeout,
        ];
        let reply = error_reply(&errors[which]);
        prop_assert!(reply.starts_with('!'));
        prop_assert!(ServerFinalMessage::decode_reply(&reply).is_err());
        prop_assert!(ServerFirstMessage::decode_reply(&reply, &[0; 30]).is_err());
    }
}

// Property: server-first decodes back to the message that was encoded
proptest! {
    #[test]
    fn prop_server_first_decodes_to_itself(
        client_nonce in prop::array::uniform30(any::<u8>()),
        server_nonce in prop::array::uniform30(any::<u8>()),
        salt in prop::array::uniform24(any::<u8>()),
        iterations in 4096u32..=9999,
    ) {
        let message = ServerFirstMessage::new(client_nonce, server_nonce, salt, iterations).unwrap();
        let decoded = ServerFirstMessage::decode_reply(&message.to_hex(), &client_nonce).unwrap();
        prop_assert_eq!(decoded, message);
    }
}

// Property: client-final decodes back to the message that was encoded
proptest! {
    #[test]
    fn prop_client_final_decodes_to_itself(
        client_nonce in prop::array::uniform30(any::<u8>()),
        server_nonce in prop::array::uniform30(any::<u8>()),
        proof in prop::array::uniform32(any::<u8>()),
    ) {
        let message = ClientFinalMessage::new(client_nonce, server_nonce, proof);
        let decoded = ClientFinalMessage::from_hex(&message.to_hex()).unwrap();
        prop_assert_eq!(decoded, message);
    }
}

// Property: server-final decodes back to the message that was encoded
proptest! {
    #[test]
    fn prop_server_final_decodes_to_itself(
        signature in prop::array::uniform32(any::<u8>()),
        token in "[!-~]{30}",
    ) {
        let message = ServerFinalMessage::new(signature, token.clone()).unwrap();
        let decoded = ServerFinalMessage::decode_reply(&message.to_hex()).unwrap();
        prop_assert_eq!(decoded.token(), token.as_str());
        prop_assert_eq!(decoded, message);
    }
}
