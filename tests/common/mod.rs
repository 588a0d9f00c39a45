//! In-process stand-in for a Go Lambda function process.
//!
//! Speaks `net/rpc` over gob exactly like the Lambda Go runtime: every
//! connection gets its own encoder and decoder, and `Function.Invoke` is the
//! only method served.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lambda_local::gob::{Decoder, Encoder, GobError, Type, Value};
use lambda_local::invoke::rpc::{RequestHeader, ResponseHeader};
use lambda_local::invoke::{InvokeRequest, InvokeResponse};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

type Handler = dyn Fn(&InvokeRequest) -> InvokeResponse + Send + Sync;

pub struct FakeFunction {
    pub address: SocketAddr,
    requests: Arc<Mutex<Vec<InvokeRequest>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeFunction {
    pub fn address(&self) -> String {
        self.address.to_string()
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeFunction {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_function<F>(handler: F) -> FakeFunction
where
    F: Fn(&InvokeRequest) -> InvokeResponse + Send + Sync + 'static,
{
    spawn_function_with_delay(Duration::ZERO, handler).await
}

/// Like [`spawn_function`], sleeping `delay` before every reply.
pub async fn spawn_function_with_delay<F>(delay: Duration, handler: F) -> FakeFunction
where
    F: Fn(&InvokeRequest) -> InvokeResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let handler: Arc<Handler> = Arc::new(handler);

    let task = {
        let requests = requests.clone();
        let connections = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                connections.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                let requests = requests.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, handler, requests, delay).await;
                });
            }
        })
    };

    FakeFunction {
        address,
        requests,
        connections,
        task,
    }
}

/// Address with no listener behind it.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

async fn serve_connection(
    mut stream: TcpStream,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<InvokeRequest>>>,
    delay: Duration,
) -> Result<(), GobError> {
    let mut decoder = Decoder::new();
    let mut encoder = Encoder::new();

    loop {
        let header: RequestHeader = decoder.decode(&mut stream).await?;
        let request: InvokeRequest = decoder.decode(&mut stream).await?;
        requests.lock().unwrap().push(request.clone());

        let mut out = Vec::new();
        if header.service_method == "Function.Invoke" {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let response = (*handler)(&request);
            let reply = ResponseHeader {
                service_method: header.service_method,
                seq: header.seq,
                error: String::new(),
            };
            encoder.encode(&reply, &mut out)?;
            encoder.encode(&response, &mut out)?;
        } else {
            let reply = ResponseHeader {
                error: format!("rpc: can't find method {}", header.service_method),
                service_method: header.service_method,
                seq: header.seq,
            };
            encoder.encode(&reply, &mut out)?;
            encoder.encode_value(
                &Type::structure("InvalidRequest", vec![]),
                &Value::Struct(vec![]),
                &mut out,
            )?;
        }
        stream.write_all(&out).await?;
    }
}

/// Proxy reply with the given status and body.
pub fn reply(status: u16, body: &str) -> InvokeResponse {
    let payload = serde_json::json!({
        "statusCode": status,
        "headers": {"Content-Type": "application/json"},
        "body": body,
    });
    InvokeResponse::with_payload(serde_json::to_vec(&payload).unwrap())
}
