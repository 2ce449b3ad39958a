//! Client side of the login handshake
//!
//! [`ScramClient`] runs the two round trips over any [`ScramTransport`], checks
//! the server's signature, and keeps the resulting token. Authenticated calls go
//! through [`ScramClient::call`], which logs in again once if the server says
//! the token is gone.

use crate::config::ClientConfig;
use crate::core::codec::WireMessage;
use crate::core::message::{
    ClientFinalMessage, ClientFirstMessage, ServerFinalMessage, ServerFirstMessage,
};
use crate::error::{ProtocolError, Result};
use crate::protocol::Operation;
use crate::utils::crypto::{
    auth_message, client_proof, derive_keys, generate_nonce, server_signature, signatures_match,
};
use crate::utils::timeout::with_timeout_error;
use std::future::Future;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

/// Request/response channel to a login server
///
/// `exchange` sends one hex payload for `operation` and returns the server's
/// reply verbatim, including `'!'` error replies.
pub trait ScramTransport: Send + Sync {
    fn exchange(
        &self,
        operation: Operation,
        payload: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

struct Session {
    username: String,
    password: Zeroizing<String>,
    token: String,
}

/// Login client holding at most one session
pub struct ScramClient<T> {
    transport: T,
    config: ClientConfig,
    session: Option<Session>,
}

impl<T: ScramTransport> ScramClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            session: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current session token, if logged in
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Forget the session, including the remembered password
    pub fn clear_token(&mut self) {
        self.session = None;
    }

    /// Log in with `username` and `password`.
    ///
    /// On any failure the client's state is left exactly as it was.
    ///
    /// # Errors
    /// - `ServerRejected`, `TooManyPendingRequests`, ... for `'!'` replies
    /// - `MalformedMessage` / `NonceMismatch` for bad server messages
    /// - `ServerSignatureMismatch` if the server could not prove it knows the key
    /// - `Timeout` if a round trip exceeds the configured response timeout
    #[instrument(skip(self, password))]
    pub async fn handshake(&mut self, username: &str, password: &str) -> Result<()> {
        let token = self.run_handshake(username, password).await?;
        self.session = Some(Session {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            token,
        });
        info!("Logged in");
        Ok(())
    }

    async fn run_handshake(&self, username: &str, password: &str) -> Result<String> {
        let client_nonce = generate_nonce()?;
        let client_first = ClientFirstMessage::new(username, client_nonce)?;
        let client_first_bytes = client_first.to_bytes();

        let reply = self
            .exchange(Operation::ClientFirst, &client_first.to_hex())
            .await?;
        let server_first = ServerFirstMessage::decode_reply(&reply, &client_nonce)?;
        debug!(iterations = server_first.iterations(), "server-first accepted");

        let keys = derive_keys(password, server_first.salt(), server_first.iterations())?;
        let without_proof =
            ClientFinalMessage::without_proof_bytes(&client_nonce, server_first.server_nonce());
        let auth = auth_message(&client_first_bytes, &server_first.to_bytes(), &without_proof);
        let proof = client_proof(keys.client_key(), keys.stored_key(), &auth)?;
        let client_final =
            ClientFinalMessage::new(client_nonce, *server_first.server_nonce(), proof);

        let reply = self
            .exchange(Operation::ClientFinal, &client_final.to_hex())
            .await?;
        let server_final = ServerFinalMessage::decode_reply(&reply)?;

        let expected = server_signature(keys.server_key(), &auth)?;
        if !signatures_match(&expected, server_final.server_signature()) {
            warn!("Server signature does not match");
            return Err(ProtocolError::ServerSignatureMismatch);
        }

        Ok(server_final.into_token())
    }

    async fn exchange(&self, operation: Operation, payload: &str) -> Result<String> {
        with_timeout_error(
            self.transport.exchange(operation, payload),
            self.config.response_timeout,
        )
        .await
    }

    /// Log in again with the remembered username and password
    pub async fn reauthenticate(&mut self) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Err(ProtocolError::NotAuthenticated);
        };
        let username = session.username.clone();
        let password = session.password.clone();
        self.handshake(&username, &password).await
    }

    /// Run an authenticated request with the current token.
    ///
    /// If the request fails with `ExpiredOrUnknownToken`, the client logs in
    /// again and retries exactly once (when enabled in the config).
    pub async fn call<F, Fut, R>(&mut self, mut request: F) -> Result<R>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let token = self
            .token()
            .ok_or(ProtocolError::NotAuthenticated)?
            .to_string();

        match request(token).await {
            Err(e) if e.is_token_invalidated() && self.config.reauthenticate_on_invalid_token => {
                debug!("Token rejected, logging in again");
                self.reauthenticate().await?;
                let token = self
                    .token()
                    .ok_or(ProtocolError::NotAuthenticated)?
                    .to_string();
                request(token).await
            }
            other => other,
        }
    }
}
