//! Server side of the login handshake
//!
//! [`ScramServer`] owns the pending handshake table and the token table behind a
//! single mutex. Each public call takes the lock once or twice for short,
//! allocation-light critical sections; key derivation work (HMAC, SHA-256) runs
//! outside it.
//!
//! ```text
//! client-first  --> decode --> capacity check --> lookup --> store pending --> server-first
//! client-final  --> decode --> take pending --> verify proof --> issue token --> server-final
//! ```

use crate::config::ServerConfig;
use crate::core::codec::{encode_hex, WireMessage};
use crate::core::message::{
    ClientFinalMessage, ClientFirstMessage, ServerFinalMessage, ServerFirstMessage,
};
use crate::credentials::{UserCredentials, UserCredentialsManager};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::pending::{PendingRequest, PendingRequests, PendingStats};
use crate::protocol::tokens::{TokenLookup, TokenStats, TokenStore};
use crate::utils::crypto::{
    auth_message, generate_nonce, generate_token, server_signature, verify_proof,
};
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::time::{expires_at, Clock, SystemClock};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};

struct ServerState {
    pending: PendingRequests,
    tokens: TokenStore,
}

/// Snapshot of the server's tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub pending: PendingStats,
    pub tokens: TokenStats,
}

/// Shared login service
///
/// Built once and handed to every request handler, usually behind an `Arc`.
pub struct ScramServer {
    credentials: Arc<UserCredentialsManager>,
    config: ServerConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
    state: Mutex<ServerState>,
}

impl std::fmt::Debug for ScramServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScramServer")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl ScramServer {
    /// Create a server reading wall-clock time
    pub fn new(credentials: Arc<UserCredentialsManager>, config: ServerConfig) -> Self {
        Self::with_clock(credentials, config, Arc::new(SystemClock))
    }

    /// Create a server with an explicit time source
    pub fn with_clock(
        credentials: Arc<UserCredentialsManager>,
        config: ServerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = ServerState {
            pending: PendingRequests::new(config.max_pending_requests),
            tokens: TokenStore::new(config.token_ttl),
        };
        info!(
            accounts = credentials.len(),
            max_pending = config.max_pending_requests,
            pending_ttl_ms = config.pending_request_ttl.as_millis() as u64,
            token_ttl_ms = config.token_ttl.as_millis() as u64,
            "SCRAM server ready"
        );
        Self {
            credentials,
            config,
            clock,
            metrics: Arc::new(Metrics::new()),
            state: Mutex::new(state),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ServerState>> {
        self.state
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.to_string()))
    }

    /// First server step: answer a hex client-first with a hex server-first.
    ///
    /// # Errors
    /// - `MalformedMessage` if the payload does not decode
    /// - `TooManyPendingRequests` if the pending table is full of live entries
    /// - `UnknownUser` if no account matches the normalized username
    #[instrument(skip(self, payload), level = "debug")]
    pub fn handle_client_first(&self, payload: &str) -> Result<String> {
        let result = self.client_first(payload);
        if result.is_err() {
            self.metrics.handshake_failed();
        }
        result
    }

    fn client_first(&self, payload: &str) -> Result<String> {
        let _timer = Timer::start("client_first");
        let client_first = ClientFirstMessage::from_hex(payload)?;
        let now = self.clock.now_millis();

        let mut state = self.lock_state()?;
        if let Err(e) = state.pending.check_capacity(now) {
            self.metrics.pending_rejected();
            return Err(e);
        }

        let Some(credentials) = self.credentials.lookup(client_first.username()) else {
            debug!("client-first for unknown account");
            return Err(ProtocolError::UnknownUser);
        };

        let client_nonce = *client_first.client_nonce();
        let server_nonce = generate_nonce()?;
        let server_first = ServerFirstMessage::new(
            client_nonce,
            server_nonce,
            *credentials.salt(),
            credentials.iterations(),
        )?;
        let server_first_bytes = server_first.to_bytes();

        let request = PendingRequest {
            credentials,
            client_first: client_first.to_bytes(),
            server_first: server_first_bytes.clone(),
            expires_at: expires_at(now, self.config.pending_request_ttl),
        };
        state
            .pending
            .insert((client_nonce, server_nonce), request, now)?;
        let pending = state.pending.len();
        drop(state);

        self.metrics.handshake_started();
        debug!(pending, "Handshake pending");
        Ok(encode_hex(&server_first_bytes))
    }

    /// Second server step: answer a hex client-final with a hex server-final.
    ///
    /// The matching pending entry is consumed before the proof is checked.
    ///
    /// # Errors
    /// - `MalformedMessage` unless the payload is exactly one client-final
    /// - `NoMatchingPendingRequest` if the nonce pair is unknown, used, or expired
    /// - `ProofVerificationFailed` if the proof does not check out
    #[instrument(skip(self, payload), level = "debug")]
    pub fn handle_client_final(&self, payload: &str) -> Result<String> {
        let result = self.client_final(payload);
        match &result {
            Ok(_) => self.metrics.handshake_completed(),
            Err(_) => self.metrics.handshake_failed(),
        }
        result
    }

    fn client_final(&self, payload: &str) -> Result<String> {
        let _timer = Timer::start("client_final");
        let client_final = ClientFinalMessage::from_hex(payload)?;
        let key = (*client_final.client_nonce(), *client_final.server_nonce());

        let now = self.clock.now_millis();
        let request = {
            let mut state = self.lock_state()?;
            let request = state.pending.take(&key, now);
            state.pending.cleanup_expired(now);
            request.ok_or(ProtocolError::NoMatchingPendingRequest)?
        };

        let auth = auth_message(
            &request.client_first,
            &request.server_first,
            &client_final.without_proof(),
        );
        if !verify_proof(request.credentials.stored_key(), client_final.client_proof(), &auth)? {
            warn!("Client proof rejected");
            return Err(ProtocolError::ProofVerificationFailed);
        }
        let signature = server_signature(request.credentials.server_key(), &auth)?;

        let now = self.clock.now_millis();
        let mut state = self.lock_state()?;
        state.tokens.evict_expired(now);
        let token = loop {
            let candidate = generate_token();
            if !state.tokens.contains(&candidate) {
                break candidate;
            }
        };
        let server_final = ServerFinalMessage::new(signature, token.clone())?;
        state
            .tokens
            .issue(token, Arc::clone(&request.credentials), now);
        drop(state);

        self.metrics.token_issued();
        info!(username = %request.credentials.username(), "Login succeeded");
        Ok(server_final.to_hex())
    }

    /// Check a session token, sliding its expiry forward when valid.
    ///
    /// This is how request handlers authenticate a caller.
    #[instrument(skip_all, level = "debug")]
    pub fn validate_token(&self, token: &str) -> Option<Arc<UserCredentials>> {
        let now = self.clock.now_millis();
        let mut state = match self.lock_state() {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Token table unavailable");
                return None;
            }
        };

        state.pending.cleanup_expired(now);
        match state.tokens.validate(token, now) {
            TokenLookup::Valid(credentials) => {
                self.metrics.token_validated();
                Some(credentials)
            }
            TokenLookup::Expired => {
                self.metrics.token_expired();
                None
            }
            TokenLookup::Unknown => None,
        }
    }

    /// Log a token out. Returns whether it was live.
    pub fn invalidate_token(&self, token: &str) -> Result<bool> {
        let removed = self.lock_state()?.tokens.invalidate(token);
        if removed {
            self.metrics.token_invalidated();
            debug!("Token invalidated");
        }
        Ok(removed)
    }

    /// Sweep both tables. Returns `(pending removed, tokens removed)`.
    pub fn sweep_expired(&self) -> Result<(usize, usize)> {
        let now = self.clock.now_millis();
        let mut state = self.lock_state()?;
        let pending = state.pending.cleanup_expired(now);
        let tokens = state.tokens.evict_expired(now);
        Ok((pending, tokens))
    }

    pub fn stats(&self) -> Result<ServerStats> {
        let now = self.clock.now_millis();
        let state = self.lock_state()?;
        Ok(ServerStats {
            pending: state.pending.stats(now),
            tokens: state.tokens.stats(now),
        })
    }
}
