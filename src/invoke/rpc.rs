//! `net/rpc` call framing over a gob stream.
//!
//! Each call writes a request header followed by the argument; the server
//! answers with a response header followed by the reply. When the header
//! carries an error the server still sends a placeholder body.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::gob::{Decoder, Encoder, Fields, GobError, GobRecord, Type, Value};
use crate::invoke::InvokeError;

/// Header preceding every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeader {
    pub service_method: String,
    pub seq: u64,
}

impl GobRecord for RequestHeader {
    fn gob_type() -> Type {
        Type::structure(
            "Request",
            vec![("ServiceMethod", Type::String), ("Seq", Type::Uint)],
        )
    }

    fn to_gob(&self) -> Value {
        Value::Struct(vec![
            ("ServiceMethod".into(), Value::String(self.service_method.clone())),
            ("Seq".into(), Value::Uint(self.seq)),
        ])
    }

    fn from_gob(value: Value) -> Result<Self, GobError> {
        let mut fields = Fields::new("Request", value)?;
        Ok(Self {
            service_method: fields.string("ServiceMethod")?,
            seq: fields.uint("Seq")?,
        })
    }
}

/// Header preceding every reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeader {
    pub service_method: String,
    pub seq: u64,
    pub error: String,
}

impl GobRecord for ResponseHeader {
    fn gob_type() -> Type {
        Type::structure(
            "Response",
            vec![
                ("ServiceMethod", Type::String),
                ("Seq", Type::Uint),
                ("Error", Type::String),
            ],
        )
    }

    fn to_gob(&self) -> Value {
        Value::Struct(vec![
            ("ServiceMethod".into(), Value::String(self.service_method.clone())),
            ("Seq".into(), Value::Uint(self.seq)),
            ("Error".into(), Value::String(self.error.clone())),
        ])
    }

    fn from_gob(value: Value) -> Result<Self, GobError> {
        let mut fields = Fields::new("Response", value)?;
        Ok(Self {
            service_method: fields.string("ServiceMethod")?,
            seq: fields.uint("Seq")?,
            error: fields.string("Error")?,
        })
    }
}

/// Client side of one RPC connection.
pub struct RpcConnection<S> {
    stream: S,
    encoder: Encoder,
    decoder: Decoder,
    seq: u64,
}

impl<S> RpcConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            seq: 0,
        }
    }

    /// Issue one synchronous call and wait for its reply.
    pub async fn call<A, R>(&mut self, method: &str, args: &A) -> Result<R, InvokeError>
    where
        A: GobRecord,
        R: GobRecord,
    {
        let seq = self.seq;
        self.seq += 1;

        let header = RequestHeader {
            service_method: method.to_string(),
            seq,
        };
        let mut buf = Vec::new();
        self.encoder.encode(&header, &mut buf)?;
        self.encoder.encode(args, &mut buf)?;
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        debug!(method, seq, bytes = buf.len(), "RPC request written");

        let response: ResponseHeader = self.decoder.decode(&mut self.stream).await?;
        if response.seq != seq {
            return Err(InvokeError::Protocol(format!(
                "reply sequence {} does not match request {}",
                response.seq, seq
            )));
        }
        if !response.error.is_empty() {
            // discard the placeholder body
            self.decoder.read_value(&mut self.stream).await?;
            return Err(InvokeError::Rpc(response.error));
        }

        let reply = self.decoder.decode(&mut self.stream).await?;
        Ok(reply)
    }

    /// Flush and shut down the write side.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.stream.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::messages::{InvokeRequest, InvokeResponse};
    use bytes::Bytes;
    use std::time::SystemTime;

    fn reply_stream(header: &ResponseHeader, body: Option<&InvokeResponse>) -> Vec<u8> {
        let mut encoder = Encoder::new();
        let mut out = Vec::new();
        encoder.encode(header, &mut out).unwrap();
        match body {
            Some(body) => encoder.encode(body, &mut out).unwrap(),
            None => encoder
                .encode_value(&Type::structure("", vec![]), &Value::Struct(vec![]), &mut out)
                .unwrap(),
        }
        out
    }

    fn request_stream(method: &str, args: &InvokeRequest) -> Vec<u8> {
        let mut encoder = Encoder::new();
        let mut out = Vec::new();
        encoder
            .encode(
                &RequestHeader {
                    service_method: method.into(),
                    seq: 0,
                },
                &mut out,
            )
            .unwrap();
        encoder.encode(args, &mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let args = InvokeRequest::new(Bytes::from_static(b"{}"), SystemTime::now());
        let reply = InvokeResponse::with_payload(Bytes::from_static(b"{\"ok\":true}"));
        let header = ResponseHeader {
            service_method: "Function.Invoke".into(),
            seq: 0,
            error: String::new(),
        };

        let mock = tokio_test::io::Builder::new()
            .write(&request_stream("Function.Invoke", &args))
            .read(&reply_stream(&header, Some(&reply)))
            .build();

        let mut conn = RpcConnection::new(mock);
        let got: InvokeResponse = conn.call("Function.Invoke", &args).await.unwrap();
        assert_eq!(got, reply);
    }

    #[tokio::test]
    async fn test_call_surfaces_server_error() {
        let args = InvokeRequest::new(Bytes::from_static(b"{}"), SystemTime::now());
        let header = ResponseHeader {
            service_method: "Function.Missing".into(),
            seq: 0,
            error: "rpc: can't find method Function.Missing".into(),
        };

        let mock = tokio_test::io::Builder::new()
            .write(&request_stream("Function.Missing", &args))
            .read(&reply_stream(&header, None))
            .build();

        let mut conn = RpcConnection::new(mock);
        let err = conn
            .call::<_, InvokeResponse>("Function.Missing", &args)
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Rpc(ref msg) if msg.contains("can't find method")));
    }

    #[tokio::test]
    async fn test_call_rejects_mismatched_sequence() {
        let args = InvokeRequest::new(Bytes::from_static(b"{}"), SystemTime::now());
        let header = ResponseHeader {
            service_method: "Function.Invoke".into(),
            seq: 4,
            error: String::new(),
        };

        let mut header_only = Vec::new();
        Encoder::new().encode(&header, &mut header_only).unwrap();

        let mock = tokio_test::io::Builder::new()
            .write(&request_stream("Function.Invoke", &args))
            .read(&header_only)
            .build();

        let mut conn = RpcConnection::new(mock);
        let err = conn
            .call::<_, InvokeResponse>("Function.Invoke", &args)
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Protocol(_)));
    }
}
