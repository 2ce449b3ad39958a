//! Load-once credential table
//!
//! The manager is built explicitly and handed to the server; there is no global
//! instance. The table is replaced wholesale on [`UserCredentialsManager::reload`]
//! and is otherwise read-only.

use super::{CredentialSource, UserCredentials};
use crate::error::Result;
use crate::utils::crypto::normalize_username;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, instrument, warn};

type CredentialTable = HashMap<String, Arc<UserCredentials>>;

/// Lookup service from normalized username to credentials
pub struct UserCredentialsManager {
    source: Box<dyn CredentialSource>,
    table: RwLock<CredentialTable>,
}

impl std::fmt::Debug for UserCredentialsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentialsManager")
            .field("accounts", &self.len())
            .finish()
    }
}

impl UserCredentialsManager {
    /// Build the table from `source`.
    ///
    /// Records with malformed encoding are logged and skipped.
    ///
    /// # Errors
    /// Propagates the source's error when it cannot be queried at all.
    pub fn load<S>(source: S) -> Result<Self>
    where
        S: CredentialSource + 'static,
    {
        let table = build_table(&source)?;
        Ok(Self {
            source: Box::new(source),
            table: RwLock::new(table),
        })
    }

    /// Find the credentials for a username (normalized before lookup).
    ///
    /// Callers must treat `None` exactly like a failed password check.
    pub fn lookup(&self, username: &str) -> Option<Arc<UserCredentials>> {
        let key = normalize_username(username).ok()?;
        // The table is only ever swapped whole, so a poisoned guard still holds a full table
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.get(&key).cloned()
    }

    /// Re-read the source and swap in a fresh table.
    ///
    /// On error the current table stays in place. Returns the number of accounts loaded.
    #[instrument(skip(self))]
    pub fn reload(&self) -> Result<usize> {
        let fresh = build_table(self.source.as_ref())?;
        let count = fresh.len();
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        *table = fresh;
        info!(accounts = count, "Credential table reloaded");
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build_table(source: &dyn CredentialSource) -> Result<CredentialTable> {
    let records = source.query_admin_credentials()?;
    let mut table = HashMap::with_capacity(records.len());
    let mut skipped = 0usize;

    for record in &records {
        match record.decode() {
            Ok(credentials) => {
                let username = credentials.username().to_string();
                if table.insert(username, Arc::new(credentials)).is_some() {
                    warn!(username = %record.username, "Duplicate credential record, keeping the last one");
                }
            }
            Err(e) => {
                skipped += 1;
                warn!(username = %record.username, error = %e, "Skipping malformed credential record");
            }
        }
    }

    info!(accounts = table.len(), skipped, "Credential table built");
    Ok(table)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialRecord, StaticCredentialSource};
    use crate::error::ProtocolError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(username: &str) -> CredentialRecord {
        CredentialRecord::from_password("ADM", username, "pw", &[1; 24], 4096).unwrap()
    }

    #[test]
    fn lookup_normalizes_and_misses_unknown() {
        let manager =
            UserCredentialsManager::load(StaticCredentialSource::new(vec![record("benoit")]))
                .unwrap();
        assert!(manager.lookup("BENOIT").is_some());
        assert!(manager.lookup(" benoit ").is_some());
        assert!(manager.lookup("nobody").is_none());
        assert!(manager.lookup("").is_none());
    }

    #[test]
    fn malformed_records_are_skipped() {
        let mut bad = record("broken");
        bad.stored_key = "not hex".into();
        let manager =
            UserCredentialsManager::load(StaticCredentialSource::new(vec![record("ok"), bad]))
                .unwrap();
        assert_eq!(manager.len(), 1);
        assert!(manager.lookup("broken").is_none());
    }

    struct Unreachable;

    impl CredentialSource for Unreachable {
        fn query_admin_credentials(&self) -> Result<Vec<CredentialRecord>> {
            Err(ProtocolError::CredentialSource("database offline".into()))
        }
    }

    #[test]
    fn unreachable_source_fails_construction() {
        assert!(matches!(
            UserCredentialsManager::load(Unreachable),
            Err(ProtocolError::CredentialSource(_))
        ));
    }

    struct Growing {
        calls: AtomicUsize,
    }

    impl CredentialSource for Growing {
        fn query_admin_credentials(&self) -> Result<Vec<CredentialRecord>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((0..n).map(|i| record(&format!("user{i}"))).collect())
        }
    }

    #[test]
    fn reload_swaps_table() {
        let manager = UserCredentialsManager::load(Growing {
            calls: AtomicUsize::new(0),
        })
        .unwrap();
        assert_eq!(manager.len(), 1);
        assert!(manager.lookup("user1").is_none());

        assert_eq!(manager.reload().unwrap(), 2);
        assert!(manager.lookup("user1").is_some());
    }
}
