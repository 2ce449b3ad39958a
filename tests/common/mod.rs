//! Shared fixture: one administrative account and a server on a manual clock

#![allow(dead_code, clippy::unwrap_used)]

use scram_session::core::codec::WireMessage;
use scram_session::core::message::{
    ClientFinalMessage, ClientFirstMessage, Nonce, ServerFirstMessage,
};
use scram_session::utils::crypto::{auth_message, client_proof, derive_keys, DerivedKeys};
use scram_session::utils::time::{Clock, ManualClock};
use scram_session::{
    CredentialRecord, Dispatcher, ScramServer, ServerConfig, StaticCredentialSource,
    UserCredentialsManager,
};
use std::sync::Arc;

pub const USERNAME: &str = "benoit";
pub const PASSWORD: &str = "testPassword";
pub const SALT: [u8; 24] = *b"fixture-salt-24-bytes!!!";
pub const ITERATIONS: u32 = 4096;
pub const START: u64 = 1_700_000_000_000;

pub fn record() -> CredentialRecord {
    CredentialRecord::from_password("ADM", USERNAME, PASSWORD, &SALT, ITERATIONS).unwrap()
}

pub fn manager() -> Arc<UserCredentialsManager> {
    Arc::new(UserCredentialsManager::load(StaticCredentialSource::new(vec![record()])).unwrap())
}

pub fn server() -> (Arc<ScramServer>, Arc<ManualClock>) {
    server_with(ServerConfig::default())
}

pub fn server_with(config: ServerConfig) -> (Arc<ScramServer>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let server = ScramServer::with_clock(manager(), config, Arc::clone(&clock) as Arc<dyn Clock>);
    (Arc::new(server), clock)
}

pub fn dispatcher(server: &Arc<ScramServer>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::for_server(Arc::clone(server)).unwrap())
}

pub fn fixture_keys() -> DerivedKeys {
    derive_keys(PASSWORD, &SALT, ITERATIONS).unwrap()
}

/// Client state between the two round trips
pub struct Started {
    pub client_first: ClientFirstMessage,
    pub server_first: ServerFirstMessage,
}

impl Started {
    /// Build the client-final this handshake expects, signed with `keys`
    pub fn client_final(&self, keys: &DerivedKeys) -> ClientFinalMessage {
        let nonce = *self.client_first.client_nonce();
        let server_nonce = *self.server_first.server_nonce();
        let auth = auth_message(
            &self.client_first.to_bytes(),
            &self.server_first.to_bytes(),
            &ClientFinalMessage::without_proof_bytes(&nonce, &server_nonce),
        );
        let proof = client_proof(keys.client_key(), keys.stored_key(), &auth).unwrap();
        ClientFinalMessage::new(nonce, server_nonce, proof)
    }
}

pub fn nonce(seed: u8) -> Nonce {
    let mut nonce = [seed; 30];
    nonce[0] = b'n';
    nonce
}

/// Send a client-first for the fixture account
pub fn start(server: &ScramServer, client_nonce: Nonce) -> Started {
    let client_first = ClientFirstMessage::new(USERNAME, client_nonce).unwrap();
    let reply = server.handle_client_first(&client_first.to_hex()).unwrap();
    let server_first = ServerFirstMessage::decode_reply(&reply, &client_nonce).unwrap();
    Started {
        client_first,
        server_first,
    }
}
