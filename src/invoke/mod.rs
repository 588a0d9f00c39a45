//! Invocation of a running function process.
//!
//! The gateway and the single-event mode only need the [`Invoker`] capability;
//! [`RpcInvoker`] is the production implementation that dials the function's
//! `net/rpc` endpoint once per call.

pub mod client;
pub mod messages;
pub mod rpc;
#[cfg(test)]
pub(crate) mod stub;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::gob::GobError;

pub use client::RpcInvoker;
pub use messages::{InvokeRequest, InvokeResponse, InvokeResponseError, StackFrame, Timestamp};

/// Remote method served by the Lambda Go runtime.
pub const DEFAULT_METHOD: &str = "Function.Invoke";

/// Transport failure of one invocation. The function's own errors arrive
/// inside [`InvokeResponse::error`] instead.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("dial {address} failed: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] GobError),

    #[error("remote call failed: {0}")]
    Rpc(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

/// Capability to invoke the function with a serialized event.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, payload: Bytes) -> Result<InvokeResponse, InvokeError>;
}

/// Where and how to reach the function process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeConfig {
    /// `host:port` of the function's RPC listener.
    pub address: String,
    /// Added to the dispatch time to form the deadline sent with each call.
    pub execution_limit: Duration,
    /// Remote method name.
    pub method: String,
    /// Local bound on a whole call. `None` leaves the deadline advisory.
    pub call_timeout: Option<Duration>,
}

impl Default for InvokeConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8000".to_string(),
            execution_limit: Duration::from_secs(5),
            method: DEFAULT_METHOD.to_string(),
            call_timeout: None,
        }
    }
}

impl InvokeConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn execution_limit(mut self, limit: Duration) -> Self {
        self.execution_limit = limit;
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}
