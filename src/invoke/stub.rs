use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::invoke::{InvokeError, InvokeResponse, Invoker};

enum Outcome {
    Reply(InvokeResponse),
    Fail(String),
}

/// Invoker that records payloads and answers with a canned outcome.
pub(crate) struct StubInvoker {
    outcome: Outcome,
    payloads: Mutex<Vec<Bytes>>,
}

impl StubInvoker {
    pub(crate) fn replying(response: InvokeResponse) -> Self {
        Self {
            outcome: Outcome::Reply(response),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            outcome: Outcome::Fail(message.to_string()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn payloads(&self) -> Vec<Bytes> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Invoker for StubInvoker {
    async fn invoke(&self, payload: Bytes) -> Result<InvokeResponse, InvokeError> {
        self.payloads.lock().unwrap().push(payload);
        match &self.outcome {
            Outcome::Reply(response) => Ok(response.clone()),
            Outcome::Fail(message) => Err(InvokeError::Rpc(message.clone())),
        }
    }
}
