//! # lambda-local
//!
//! A local stand-in for API Gateway in front of a Go Lambda function.
//!
//! The function is started separately (with `_LAMBDA_SERVER_PORT` set) and
//! listens for `Function.Invoke` calls over Go `net/rpc`. This crate turns
//! HTTP requests into API proxy events, invokes the function with them, and
//! turns the proxy reply back into an HTTP response.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  HTTP   ┌──────────────────────────────┐  gob/net-rpc  ┌──────────┐
//! │  client  │ ──────▶ │ GatewayServer                │ ────────────▶ │ function │
//! │          │ ◀────── │  RouteTable → ApiEvent       │ ◀──────────── │ process  │
//! └──────────┘         │  Invoker    → ApiReply       │               └──────────┘
//!                      └──────────────────────────────┘
//!                               ▲
//!                        template.yaml
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lambda_local::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GatewayError> {
//!     let routes = parse_template("template.yaml")?;
//!     let invoker = Arc::new(RpcInvoker::new(InvokeConfig::new("localhost:8001")));
//!     let server = GatewayServer::new(GatewayConfig::new().port(3000), routes, invoker)?;
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod format;
pub mod gob;
pub mod http;
pub mod invoke;
pub mod normalize;
pub mod routing;
pub mod runtime;
pub mod template;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::error::GatewayError;
    pub use crate::http::{ApiEvent, ApiReply};
    pub use crate::invoke::{InvokeConfig, InvokeError, InvokeResponse, Invoker, RpcInvoker};
    pub use crate::routing::{Route, RouteTable};
    pub use crate::runtime::{run_event, GatewayConfig, GatewayServer, ServerState};
    pub use crate::template::parse_template;
    pub use async_trait::async_trait;
}

pub use error::GatewayError;
pub use invoke::{InvokeConfig, Invoker, RpcInvoker};
pub use runtime::{GatewayConfig, GatewayServer};
