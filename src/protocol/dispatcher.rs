use crate::config::ERROR_PREFIX;
use crate::core::codec::error_reply;
use crate::credentials::UserCredentials;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::server::ScramServer;
use crate::protocol::Operation;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

type HandlerFn = dyn Fn(&str) -> Result<String> + Send + Sync + 'static;

/// Routes named wire operations to handlers and renders their replies.
/// Known operations are registered under `Cow::Borrowed` names.
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Box<HandlerFn>>>>,
    server: Option<Arc<ScramServer>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            server: None,
        }
    }

    /// A dispatcher serving the two login steps of `server`
    pub fn for_server(server: Arc<ScramServer>) -> Result<Self> {
        let mut dispatcher = Self::new();

        let first = Arc::clone(&server);
        dispatcher.register_static(Operation::ClientFirst.as_str(), move |payload| {
            first.handle_client_first(payload)
        })?;
        let last = Arc::clone(&server);
        dispatcher.register_static(Operation::ClientFinal.as_str(), move |payload| {
            last.handle_client_final(payload)
        })?;

        dispatcher.server = Some(server);
        Ok(dispatcher)
    }

    pub fn register<F>(&self, operation: &str, handler: F) -> Result<()>
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.insert(Cow::Owned(operation.to_string()), Box::new(handler))
    }

    fn register_static<F>(&self, operation: &'static str, handler: F) -> Result<()>
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.insert(Cow::Borrowed(operation), Box::new(handler))
    }

    fn insert(&self, operation: Cow<'static, str>, handler: Box<HandlerFn>) -> Result<()> {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom("Failed to acquire write lock on dispatcher".to_string())
        })?;

        handlers.insert(operation, handler);
        Ok(())
    }

    /// Run `operation` on `payload`.
    ///
    /// Always produces a wire reply: the handler's hex output, or `'!'`
    /// followed by the error text.
    pub fn dispatch(&self, operation: &str, payload: &str) -> String {
        match self.try_dispatch(operation, payload) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(operation, error = %e, "Operation failed");
                error_reply(&e)
            }
        }
    }

    fn try_dispatch(&self, operation: &str, payload: &str) -> Result<String> {
        let handlers = self.handlers.read().map_err(|_| {
            ProtocolError::Custom("Failed to acquire read lock on dispatcher".to_string())
        })?;

        match handlers.get(operation) {
            Some(handler) => handler(payload),
            None => Ok(format!("{ERROR_PREFIX}{}", constants::WIRE_UNKNOWN_OPERATION)),
        }
    }

    /// Resolve a session token to its account, for authenticated operations.
    ///
    /// # Errors
    /// `ExpiredOrUnknownToken` when the token is not live, or when no server is
    /// attached to this dispatcher.
    pub fn authenticate(&self, token: &str) -> Result<Arc<UserCredentials>> {
        self.server
            .as_ref()
            .and_then(|server| server.validate_token(token))
            .ok_or(ProtocolError::ExpiredOrUnknownToken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operation_gets_error_reply() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.dispatch("logout", ""), "!Unknown operation");
    }

    #[test]
    fn handler_errors_become_bang_replies() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register("client-first", |_| Err(ProtocolError::TooManyPendingRequests))
            .unwrap();
        dispatcher
            .register("echo", |payload| Ok(payload.to_string()))
            .unwrap();

        assert_eq!(
            dispatcher.dispatch("client-first", "00"),
            "!Too many pending requests"
        );
        assert_eq!(dispatcher.dispatch("echo", "abcd"), "abcd");
    }

    #[test]
    fn authenticate_without_server_fails() {
        let dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.authenticate("anything"),
            Err(ProtocolError::ExpiredOrUnknownToken)
        ));
    }
}
