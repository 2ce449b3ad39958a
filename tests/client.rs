//! Client orchestrator against an in-process server

#![allow(clippy::unwrap_used)]

mod common;

use common::*;
use scram_session::error::{ProtocolError, Result};
use scram_session::{ClientConfig, LocalTransport, Operation, ScramClient, ScramTransport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn client_for(
    dispatcher: &Arc<scram_session::Dispatcher>,
    config: ClientConfig,
) -> ScramClient<LocalTransport> {
    ScramClient::new(LocalTransport::new(Arc::clone(dispatcher)), config)
}

#[tokio::test]
async fn handshake_stores_token_the_server_accepts() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let mut client = client_for(&dispatcher, ClientConfig::default());

    assert!(client.token().is_none());
    client.handshake("Benoit", PASSWORD).await.unwrap();

    let token = client.token().unwrap();
    assert_eq!(token.len(), 30);
    assert_eq!(server.validate_token(token).unwrap().role(), "ADM");
}

#[tokio::test]
async fn failed_login_stores_nothing() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let mut client = client_for(&dispatcher, ClientConfig::default());

    let err = client.handshake(USERNAME, "wrong").await.unwrap_err();
    assert!(matches!(err, ProtocolError::ServerRejected(ref text) if text == "Invalid login"));
    assert!(!client.is_authenticated());

    let err = client.handshake("nobody", PASSWORD).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ServerRejected(_)));
    assert!(client.token().is_none());
}

#[tokio::test]
async fn failed_relogin_keeps_previous_session() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let mut client = client_for(&dispatcher, ClientConfig::default());

    client.handshake(USERNAME, PASSWORD).await.unwrap();
    let before = client.token().unwrap().to_string();
    assert!(client.handshake(USERNAME, "wrong").await.is_err());
    assert_eq!(client.token(), Some(before.as_str()));
}

#[tokio::test]
async fn invalidated_token_triggers_one_relogin() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let mut client = client_for(&dispatcher, ClientConfig::default());
    client.handshake(USERNAME, PASSWORD).await.unwrap();

    let old = client.token().unwrap().to_string();
    server.invalidate_token(&old).unwrap();

    let d = Arc::clone(&dispatcher);
    let role = client
        .call(|token| {
            let d = Arc::clone(&d);
            async move { d.authenticate(&token).map(|c| c.role().to_string()) }
        })
        .await
        .unwrap();

    assert_eq!(role, "ADM");
    assert_ne!(client.token().unwrap(), old);
    assert_eq!(server.metrics().snapshot().handshakes_completed, 2);
}

#[tokio::test]
async fn relogin_happens_at_most_once() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let mut client = client_for(&dispatcher, ClientConfig::default());
    client.handshake(USERNAME, PASSWORD).await.unwrap();

    let attempts = AtomicUsize::new(0);
    let out: Result<()> = client
        .call(|_token| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ProtocolError::ExpiredOrUnknownToken) }
        })
        .await;

    assert!(matches!(out, Err(ProtocolError::ExpiredOrUnknownToken)));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(server.metrics().snapshot().handshakes_completed, 2);
}

#[tokio::test]
async fn relogin_can_be_disabled() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let config = ClientConfig {
        reauthenticate_on_invalid_token: false,
        ..ClientConfig::default()
    };
    let mut client = client_for(&dispatcher, config);
    client.handshake(USERNAME, PASSWORD).await.unwrap();
    server.invalidate_token(client.token().unwrap()).unwrap();

    let d = Arc::clone(&dispatcher);
    let out = client
        .call(|token| {
            let d = Arc::clone(&d);
            async move { d.authenticate(&token).map(|_| ()) }
        })
        .await;
    assert!(matches!(out, Err(ProtocolError::ExpiredOrUnknownToken)));
}

#[tokio::test]
async fn other_errors_are_not_retried() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let mut client = client_for(&dispatcher, ClientConfig::default());
    client.handshake(USERNAME, PASSWORD).await.unwrap();

    let attempts = AtomicUsize::new(0);
    let out: Result<()> = client
        .call(|_token| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ProtocolError::Custom("boom".into())) }
        })
        .await;
    assert!(matches!(out, Err(ProtocolError::Custom(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

/// Corrupts the server signature on its way back to the client
struct ForgedSignature {
    inner: LocalTransport,
}

impl ScramTransport for ForgedSignature {
    async fn exchange(&self, operation: Operation, payload: &str) -> Result<String> {
        let reply = self.inner.exchange(operation, payload).await?;
        if operation != Operation::ClientFinal || reply.starts_with('!') {
            return Ok(reply);
        }
        let mut bytes = hex::decode(&reply).unwrap();
        bytes[0] ^= 0xFF;
        Ok(hex::encode(bytes))
    }
}

#[tokio::test]
async fn client_refuses_token_without_matching_signature() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let transport = ForgedSignature {
        inner: LocalTransport::new(Arc::clone(&dispatcher)),
    };
    let mut client = ScramClient::new(transport, ClientConfig::default());

    assert!(matches!(
        client.handshake(USERNAME, PASSWORD).await,
        Err(ProtocolError::ServerSignatureMismatch)
    ));
    assert!(client.token().is_none());
}

#[tokio::test]
async fn clear_token_logs_out_locally() {
    let (server, _clock) = server();
    let dispatcher = dispatcher(&server);
    let mut client = client_for(&dispatcher, ClientConfig::default());
    client.handshake(USERNAME, PASSWORD).await.unwrap();

    client.clear_token();
    assert!(!client.is_authenticated());
    assert!(matches!(
        client.reauthenticate().await,
        Err(ProtocolError::NotAuthenticated)
    ));
}
