#![no_main]

use libfuzzer_sys::fuzz_target;
use scram_session::core::message::{
    ClientFinalMessage, ClientFirstMessage, ServerFinalMessage, ServerFirstMessage,
};

fuzz_target!(|data: &[u8]| {
    // Raw bytes straight into every decoder
    let _ = ClientFirstMessage::from_bytes(data);
    let _ = ClientFinalMessage::from_bytes(data);
    let _ = ServerFinalMessage::from_bytes(data);
    if data.len() >= 30 {
        let mut nonce = [0u8; 30];
        nonce.copy_from_slice(&data[..30]);
        let _ = ServerFirstMessage::from_bytes(data, &nonce);
    }

    // And the same bytes as a transport string
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = ClientFirstMessage::from_hex(text);
        let _ = ServerFinalMessage::decode_reply(text);
    }
});
