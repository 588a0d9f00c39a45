//! Gateway error taxonomy.

use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

use crate::invoke::InvokeError;

/// Every failure the gateway can report, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("descriptor {path} unreadable: {source}")]
    DescriptorUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("descriptor malformed: {0}")]
    DescriptorMalformed(#[from] serde_yaml::Error),

    #[error("descriptor declares no API routes")]
    NoRoutes,

    #[error("body read failed: {0}")]
    BodyRead(String),

    #[error("marshal failed: {0}")]
    Marshal(#[source] serde_json::Error),

    #[error("invocation failed: {0}")]
    Invocation(#[from] InvokeError),

    #[error("response malformed: {0}")]
    ResponseMalformed(#[source] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bind {address} failed: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {0}")]
    Listener(#[source] std::io::Error),

    #[error("server forced to shut down after {0:?}")]
    ForcedShutdown(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GatewayError {
    /// HTTP status reported to the client for a per-request failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BodyRead(_) => StatusCode::BAD_REQUEST,
            GatewayError::Invocation(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
