//! # scram-session
//!
//! Password login for administrative accounts without sending the password.
//!
//! A client proves knowledge of a password-derived key with a SCRAM-SHA-256
//! challenge-response exchange and receives an opaque 30-character session
//! token. The server checks tokens on every authenticated call and slides their
//! expiry forward on each use.
//!
//! ## Layout
//! - [`core`]: message layouts and the hex codec
//! - [`utils`]: key derivation, clocks, timeouts, logging, metrics
//! - [`credentials`]: verifier records and the lookup table
//! - [`protocol`]: server and client orchestrators, operation dispatch
//! - [`transport`]: in-process carrier
//!
//! ## Example
//! ```no_run
//! use scram_session::{
//!     ClientConfig, CredentialRecord, Dispatcher, LocalTransport, ScramClient, ScramServer,
//!     ServerConfig, StaticCredentialSource, UserCredentialsManager,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> scram_session::Result<()> {
//! let salt = scram_session::utils::crypto::generate_salt()?;
//! let record = CredentialRecord::from_password("ADM", "benoit", "testPassword", &salt, 4096)?;
//! let manager = UserCredentialsManager::load(StaticCredentialSource::new(vec![record]))?;
//!
//! let server = Arc::new(ScramServer::new(Arc::new(manager), ServerConfig::default()));
//! let dispatcher = Arc::new(Dispatcher::for_server(Arc::clone(&server))?);
//!
//! let mut client = ScramClient::new(LocalTransport::new(dispatcher), ClientConfig::default());
//! client.handshake("benoit", "testPassword").await?;
//! assert!(server.validate_token(client.token().unwrap_or_default()).is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod credentials;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::{ClientConfig, CredentialsConfig, LoggingConfig, ScramConfig, ServerConfig};
pub use credentials::{
    CredentialRecord, CredentialSource, FileCredentialSource, StaticCredentialSource,
    UserCredentials, UserCredentialsManager,
};
pub use error::{ProtocolError, Result};
pub use protocol::client::{ScramClient, ScramTransport};
pub use protocol::dispatcher::Dispatcher;
pub use protocol::server::{ScramServer, ServerStats};
pub use protocol::Operation;
pub use transport::LocalTransport;
