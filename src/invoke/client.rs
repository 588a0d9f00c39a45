//! RPC invoker that dials the function process for every call.

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::invoke::messages::{InvokeRequest, InvokeResponse};
use crate::invoke::rpc::RpcConnection;
use crate::invoke::{InvokeConfig, InvokeError, Invoker};

/// Production [`Invoker`]: one fresh TCP connection per invocation, no pooling.
#[derive(Debug, Clone)]
pub struct RpcInvoker {
    config: InvokeConfig,
}

impl RpcInvoker {
    pub fn new(config: InvokeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InvokeConfig {
        &self.config
    }

    async fn call(&self, request: InvokeRequest) -> Result<InvokeResponse, InvokeError> {
        let stream = TcpStream::connect(&self.config.address)
            .await
            .map_err(|source| InvokeError::Dial {
                address: self.config.address.clone(),
                source,
            })?;

        let mut conn = RpcConnection::new(stream);
        let result = conn.call(&self.config.method, &request).await;

        if let Err(err) = conn.close().await {
            debug!(error = %err, "closing RPC connection failed");
        }
        result
    }
}

#[async_trait]
impl Invoker for RpcInvoker {
    async fn invoke(&self, payload: Bytes) -> Result<InvokeResponse, InvokeError> {
        let deadline = SystemTime::now() + self.config.execution_limit;
        let request = InvokeRequest::new(payload, deadline);
        debug!(
            address = %self.config.address,
            method = %self.config.method,
            request_id = %request.request_id,
            "invoking function"
        );

        match self.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.call(request)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout = ?limit, "function did not reply in time");
                    Err(InvokeError::TimedOut(limit))
                }
            },
            None => self.call(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_invoke_without_listener_is_dial_error() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let invoker = RpcInvoker::new(InvokeConfig::new(address.clone()));
        let err = invoker.invoke(Bytes::from_static(b"{}")).await.unwrap_err();

        match err {
            InvokeError::Dial { address: got, .. } => assert_eq!(got, address),
            other => panic!("expected dial error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_timeout_bounds_silent_function() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        // accept and never answer
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let invoker = RpcInvoker::new(
            InvokeConfig::new(address).call_timeout(Some(Duration::from_millis(100))),
        );
        let err = invoker.invoke(Bytes::from_static(b"{}")).await.unwrap_err();
        assert!(matches!(err, InvokeError::TimedOut(_)));

        server.abort();
    }
}
