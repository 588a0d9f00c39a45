//! Records exchanged with the function process on `Function.Invoke`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Serialize;

use crate::gob::{Fields, GobError, GobRecord, Type, Value};

/// Absolute wall-clock instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i64,
}

impl Timestamp {
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self {
                seconds: since.as_secs() as i64,
                nanos: i64::from(since.subsec_nanos()),
            },
            Err(before) => {
                let before = before.duration();
                Self {
                    seconds: -(before.as_secs() as i64),
                    nanos: -i64::from(before.subsec_nanos()),
                }
            }
        }
    }
}

impl GobRecord for Timestamp {
    fn gob_type() -> Type {
        Type::structure(
            "InvokeRequest_Timestamp",
            vec![("Seconds", Type::Int), ("Nanos", Type::Int)],
        )
    }

    fn to_gob(&self) -> Value {
        Value::Struct(vec![
            ("Seconds".into(), Value::Int(self.seconds)),
            ("Nanos".into(), Value::Int(self.nanos)),
        ])
    }

    fn from_gob(value: Value) -> Result<Self, GobError> {
        let mut fields = Fields::new("InvokeRequest_Timestamp", value)?;
        Ok(Self {
            seconds: fields.int("Seconds")?,
            nanos: fields.int("Nanos")?,
        })
    }
}

/// Argument of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeRequest {
    pub payload: Bytes,
    pub request_id: String,
    pub x_amzn_trace_id: String,
    pub deadline: Timestamp,
    pub invoked_function_arn: String,
    pub cognito_identity_id: String,
    pub cognito_identity_pool_id: String,
    pub client_context: Vec<u8>,
}

impl InvokeRequest {
    /// A request with a fresh request id and the given absolute deadline.
    pub fn new(payload: Bytes, deadline: SystemTime) -> Self {
        Self {
            payload,
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline: Timestamp::from_system_time(deadline),
            ..Default::default()
        }
    }
}

impl GobRecord for InvokeRequest {
    fn gob_type() -> Type {
        Type::structure(
            "InvokeRequest",
            vec![
                ("Payload", Type::Bytes),
                ("RequestId", Type::String),
                ("XAmznTraceId", Type::String),
                ("Deadline", Timestamp::gob_type()),
                ("InvokedFunctionArn", Type::String),
                ("CognitoIdentityId", Type::String),
                ("CognitoIdentityPoolId", Type::String),
                ("ClientContext", Type::Bytes),
            ],
        )
    }

    fn to_gob(&self) -> Value {
        Value::Struct(vec![
            ("Payload".into(), Value::Bytes(self.payload.to_vec())),
            ("RequestId".into(), Value::String(self.request_id.clone())),
            ("XAmznTraceId".into(), Value::String(self.x_amzn_trace_id.clone())),
            ("Deadline".into(), self.deadline.to_gob()),
            (
                "InvokedFunctionArn".into(),
                Value::String(self.invoked_function_arn.clone()),
            ),
            (
                "CognitoIdentityId".into(),
                Value::String(self.cognito_identity_id.clone()),
            ),
            (
                "CognitoIdentityPoolId".into(),
                Value::String(self.cognito_identity_pool_id.clone()),
            ),
            ("ClientContext".into(), Value::Bytes(self.client_context.clone())),
        ])
    }

    fn from_gob(value: Value) -> Result<Self, GobError> {
        let mut fields = Fields::new("InvokeRequest", value)?;
        Ok(Self {
            payload: Bytes::from(fields.bytes("Payload")?),
            request_id: fields.string("RequestId")?,
            x_amzn_trace_id: fields.string("XAmznTraceId")?,
            deadline: fields.record("Deadline")?.unwrap_or_default(),
            invoked_function_arn: fields.string("InvokedFunctionArn")?,
            cognito_identity_id: fields.string("CognitoIdentityId")?,
            cognito_identity_pool_id: fields.string("CognitoIdentityPoolId")?,
            client_context: fields.bytes("ClientContext")?,
        })
    }
}

/// One frame of a remote stack trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub path: String,
    pub line: i64,
    pub label: String,
}

impl GobRecord for StackFrame {
    fn gob_type() -> Type {
        Type::structure(
            "InvokeResponse_Error_StackFrame",
            vec![("Path", Type::String), ("Line", Type::Int), ("Label", Type::String)],
        )
    }

    fn to_gob(&self) -> Value {
        Value::Struct(vec![
            ("Path".into(), Value::String(self.path.clone())),
            ("Line".into(), Value::Int(self.line)),
            ("Label".into(), Value::String(self.label.clone())),
        ])
    }

    fn from_gob(value: Value) -> Result<Self, GobError> {
        let mut fields = Fields::new("InvokeResponse_Error_StackFrame", value)?;
        Ok(Self {
            path: fields.string("Path")?,
            line: fields.int("Line")?,
            label: fields.string("Label")?,
        })
    }
}

/// Error raised by the function itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvokeResponseError {
    #[serde(rename = "errorMessage")]
    pub message: String,
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "stackTrace", skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<StackFrame>,
    #[serde(skip)]
    pub should_exit: bool,
}

impl InvokeResponseError {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: error_type.into(),
            ..Default::default()
        }
    }
}

impl GobRecord for InvokeResponseError {
    fn gob_type() -> Type {
        Type::structure(
            "InvokeResponse_Error",
            vec![
                ("Message", Type::String),
                ("Type", Type::String),
                ("StackTrace", Type::slice(StackFrame::gob_type())),
                ("ShouldExit", Type::Bool),
            ],
        )
    }

    fn to_gob(&self) -> Value {
        Value::Struct(vec![
            ("Message".into(), Value::String(self.message.clone())),
            ("Type".into(), Value::String(self.error_type.clone())),
            (
                "StackTrace".into(),
                Value::List(self.stack_trace.iter().map(StackFrame::to_gob).collect()),
            ),
            ("ShouldExit".into(), Value::Bool(self.should_exit)),
        ])
    }

    fn from_gob(value: Value) -> Result<Self, GobError> {
        let mut fields = Fields::new("InvokeResponse_Error", value)?;
        Ok(Self {
            message: fields.string("Message")?,
            error_type: fields.string("Type")?,
            stack_trace: fields
                .list("StackTrace")?
                .into_iter()
                .map(StackFrame::from_gob)
                .collect::<Result<_, _>>()?,
            should_exit: fields.bool("ShouldExit")?,
        })
    }
}

/// Reply of one invocation. An empty payload means the function returned none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeResponse {
    pub payload: Bytes,
    pub headers: HashMap<String, String>,
    pub error: Option<InvokeResponseError>,
}

impl InvokeResponse {
    pub fn with_payload(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_error(error: InvokeResponseError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

impl GobRecord for InvokeResponse {
    fn gob_type() -> Type {
        Type::structure(
            "InvokeResponse",
            vec![
                ("Payload", Type::Bytes),
                ("Headers", Type::map(Type::String, Type::String)),
                ("Error", InvokeResponseError::gob_type()),
            ],
        )
    }

    fn to_gob(&self) -> Value {
        let mut headers: Vec<_> = self.headers.iter().collect();
        headers.sort();
        Value::Struct(vec![
            ("Payload".into(), Value::Bytes(self.payload.to_vec())),
            (
                "Headers".into(),
                Value::Map(
                    headers
                        .into_iter()
                        .map(|(k, v)| (Value::String(k.clone()), Value::String(v.clone())))
                        .collect(),
                ),
            ),
            (
                "Error".into(),
                self.error.as_ref().map_or(Value::Nil, InvokeResponseError::to_gob),
            ),
        ])
    }

    fn from_gob(value: Value) -> Result<Self, GobError> {
        let mut fields = Fields::new("InvokeResponse", value)?;
        let mut headers = HashMap::new();
        for (key, value) in fields.map("Headers")? {
            match (key, value) {
                (Value::String(k), Value::String(v)) => {
                    headers.insert(k, v);
                }
                _ => {
                    return Err(GobError::Mismatch {
                        field: "InvokeResponse.Headers".into(),
                        expected: "map[string]string",
                    })
                }
            }
        }
        Ok(Self {
            payload: Bytes::from(fields.bytes("Payload")?),
            headers,
            error: fields.record("Error")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_from_system_time() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 250);
        let ts = Timestamp::from_system_time(time);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 250);
    }

    #[test]
    fn test_request_gets_unique_ids() {
        let deadline = SystemTime::now();
        let a = InvokeRequest::new(Bytes::from_static(b"{}"), deadline);
        let b = InvokeRequest::new(Bytes::from_static(b"{}"), deadline);
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.deadline, b.deadline);
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let value = Value::Struct(vec![("Payload".into(), Value::Bytes(b"{}".to_vec()))]);
        let response = InvokeResponse::from_gob(value).unwrap();
        assert_eq!(response.payload, Bytes::from_static(b"{}"));
        assert!(response.headers.is_empty());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_error_serializes_like_the_runtime() {
        let mut error = InvokeResponseError::new("boom", "errorString");
        error.stack_trace.push(StackFrame {
            path: "main.go".into(),
            line: 12,
            label: "Handler".into(),
        });

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["errorMessage"], "boom");
        assert_eq!(json["errorType"], "errorString");
        assert_eq!(json["stackTrace"][0]["line"], 12);
        assert!(json.get("should_exit").is_none());
    }
}
