//! Pending handshake table
//!
//! Holds every accepted client-first until its client-final arrives or it
//! expires. Entries are keyed by the `(client nonce, server nonce)` pair the
//! client must echo. Expired entries are swept lazily on each insert.
//!
//! The table itself is not synchronized; the server keeps it behind its one lock.

use crate::core::message::Nonce;
use crate::credentials::UserCredentials;
use crate::error::{ProtocolError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lookup key for a pending handshake
pub type NoncePair = (Nonce, Nonce);

/// An accepted client-first waiting for its client-final
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub credentials: Arc<UserCredentials>,
    /// Raw client-first bytes, first part of the auth message
    pub client_first: Vec<u8>,
    /// Raw server-first bytes, second part of the auth message
    pub server_first: Vec<u8>,
    /// Milliseconds since the epoch after which the entry is dead
    pub expires_at: u64,
}

impl PendingRequest {
    #[inline]
    fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }
}

/// Bounded table of pending handshakes
#[derive(Debug)]
pub struct PendingRequests {
    entries: HashMap<NoncePair, PendingRequest>,
    max_entries: usize,
}

impl PendingRequests {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_entries),
            max_entries,
        }
    }

    /// Drop every entry whose deadline has passed
    pub fn cleanup_expired(&mut self, now: u64) -> usize {
        let initial_count = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        let removed = initial_count - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Expired pending handshakes swept");
        }
        removed
    }

    /// Store a new pending handshake.
    ///
    /// # Errors
    /// `TooManyPendingRequests` if the table is still full after sweeping.
    pub fn insert(&mut self, key: NoncePair, request: PendingRequest, now: u64) -> Result<()> {
        self.cleanup_expired(now);

        if self.entries.len() >= self.max_entries {
            warn!(
                pending = self.entries.len(),
                max = self.max_entries,
                "Pending handshake table full"
            );
            return Err(ProtocolError::TooManyPendingRequests);
        }

        self.entries.insert(key, request);
        Ok(())
    }

    /// Reserve room for a new entry without inserting it
    pub fn check_capacity(&mut self, now: u64) -> Result<()> {
        self.cleanup_expired(now);
        if self.entries.len() >= self.max_entries {
            return Err(ProtocolError::TooManyPendingRequests);
        }
        Ok(())
    }

    /// Remove and return the live entry for `key`.
    ///
    /// A match is consumed whether or not the proof that follows is valid, so a
    /// pair can never be tried twice.
    pub fn take(&mut self, key: &NoncePair, now: u64) -> Option<PendingRequest> {
        let request = self.entries.remove(key)?;
        if request.is_expired(now) {
            debug!("Pending handshake matched after its deadline");
            return None;
        }
        Some(request)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self, now: u64) -> PendingStats {
        PendingStats {
            entries: self.entries.len(),
            expired: self.entries.values().filter(|e| e.is_expired(now)).count(),
            max_entries: self.max_entries,
        }
    }
}

/// Statistics about the pending table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStats {
    /// Entries currently held, including expired ones not yet swept
    pub entries: usize,
    /// Entries past their deadline
    pub expired: usize,
    pub max_entries: usize,
}
