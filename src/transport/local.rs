//! In-process transport
//!
//! Hands payloads straight to a [`Dispatcher`] in the same process. Used by
//! desktop front ends that embed the server, and by tests.

use crate::error::Result;
use crate::protocol::client::ScramTransport;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::Operation;
use std::sync::Arc;
use tracing::trace;

/// Client transport bound to a local dispatcher
#[derive(Clone)]
pub struct LocalTransport {
    dispatcher: Arc<Dispatcher>,
}

impl LocalTransport {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl ScramTransport for LocalTransport {
    async fn exchange(&self, operation: Operation, payload: &str) -> Result<String> {
        let reply = self.dispatcher.dispatch(operation.as_str(), payload);
        trace!(%operation, reply_len = reply.len(), "Local exchange");
        Ok(reply)
    }
}
