//! Issued session tokens with sliding expiry
//!
//! One map from token to `{credentials, expires_at}`. A token dies when it is
//! found expired on access, when a sweep passes over it, or when it is
//! invalidated explicitly. Every successful validation pushes the deadline out
//! by a full TTL.

use crate::credentials::UserCredentials;
use crate::utils::time::expires_at;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct TokenEntry {
    credentials: Arc<UserCredentials>,
    expires_at: u64,
}

impl TokenEntry {
    #[inline]
    fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }
}

/// Outcome of a token lookup
#[derive(Debug, Clone)]
pub enum TokenLookup {
    Valid(Arc<UserCredentials>),
    Expired,
    Unknown,
}

/// Token table
#[derive(Debug)]
pub struct TokenStore {
    tokens: HashMap<String, TokenEntry>,
    ttl: Duration,
    total_issued: u64,
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: HashMap::new(),
            ttl,
            total_issued: 0,
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    /// Bind `token` to `credentials` until `now + ttl`
    pub fn issue(&mut self, token: String, credentials: Arc<UserCredentials>, now: u64) {
        let entry = TokenEntry {
            credentials,
            expires_at: expires_at(now, self.ttl),
        };
        self.tokens.insert(token, entry);
        self.total_issued += 1;
        trace!(live_tokens = self.tokens.len(), "Token issued");
    }

    /// Look a token up, renewing it when valid and evicting it when expired
    pub fn validate(&mut self, token: &str, now: u64) -> TokenLookup {
        let Some(entry) = self.tokens.get_mut(token) else {
            return TokenLookup::Unknown;
        };

        if entry.is_expired(now) {
            self.tokens.remove(token);
            debug!("Expired token evicted on access");
            return TokenLookup::Expired;
        }

        entry.expires_at = expires_at(now, self.ttl);
        TokenLookup::Valid(Arc::clone(&entry.credentials))
    }

    /// Remove a token. Returns whether it was present.
    pub fn invalidate(&mut self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    /// Drop every expired token
    pub fn evict_expired(&mut self, now: u64) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.tokens.len();

        if removed > 0 {
            debug!(
                removed_count = removed,
                remaining_count = self.tokens.len(),
                "Expired tokens evicted"
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn stats(&self, now: u64) -> TokenStats {
        TokenStats {
            live_tokens: self.tokens.len(),
            expired_count: self.tokens.values().filter(|e| e.is_expired(now)).count(),
            total_issued: self.total_issued,
        }
    }
}

/// Statistics about the token table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenStats {
    /// Tokens currently held, including expired ones not yet evicted
    pub live_tokens: usize,
    pub expired_count: usize,
    /// Tokens ever issued
    pub total_issued: u64,
}
