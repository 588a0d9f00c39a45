//! Gateway HTTP server.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::{HeaderValue, ALLOW};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{GatewayError, Result};
use crate::format::{divider, render_payload, render_remote_error};
use crate::http::{error_response, translate, ApiEvent};
use crate::invoke::{InvokeResponse, Invoker};
use crate::routing::{Lookup, Route, RouteTable};
use crate::runtime::signal::shutdown_signal;
use crate::runtime::GatewayConfig;

/// Lifecycle of a [`GatewayServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
}

/// State shared by every request handler. Read-only once serving.
struct Gateway {
    config: GatewayConfig,
    routes: RouteTable,
    invoker: Arc<dyn Invoker>,
}

/// Local API gateway.
///
/// Serves the descriptor's routes over HTTP/1.1, turning each request into an
/// invocation of the function behind `invoker`.
pub struct GatewayServer {
    gateway: Arc<Gateway>,
    state: watch::Sender<ServerState>,
}

impl GatewayServer {
    /// Create a server for `routes`. An empty route set is a configuration
    /// error.
    pub fn new(config: GatewayConfig, routes: Vec<Route>, invoker: Arc<dyn Invoker>) -> Result<Self> {
        if routes.is_empty() {
            return Err(GatewayError::NoRoutes);
        }
        let routes = RouteTable::from_routes(routes)?;
        let (state, _) = watch::channel(ServerState::Idle);
        Ok(Self {
            gateway: Arc::new(Gateway {
                config,
                routes,
                invoker,
            }),
            state,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.gateway.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.gateway.routes
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = self.gateway.config.bind_addr();
        TcpListener::bind(&address)
            .await
            .map_err(|source| GatewayError::Bind { address, source })
    }

    /// Bind, serve, and shut down on Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        self.state.send_replace(ServerState::Starting);
        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(err) => {
                self.state.send_replace(ServerState::Stopped);
                return Err(err);
            }
        };
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then give in-flight
    /// requests the configured grace period.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.state.send_replace(ServerState::Starting);
        let host = match listener.local_addr() {
            Ok(addr) => format!("{}:{}", self.gateway.config.host, addr.port()),
            Err(_) => self.gateway.config.bind_addr(),
        };
        for route in self.gateway.routes.routes() {
            info!("{} http://{}{}", route.method, host, route.path);
        }

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        let mut backoff: Option<Duration> = None;
        tokio::pin!(shutdown);

        self.state.send_replace(ServerState::Serving);
        info!("Gateway listening on {}", host);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(accepted) => {
                            backoff = None;
                            accepted
                        }
                        Err(err) => match classify_accept_error(&err) {
                            AcceptFailure::Skip => {
                                warn!(error = %err, "accept failed");
                                continue;
                            }
                            AcceptFailure::Backoff => {
                                let delay = next_backoff(backoff);
                                backoff = Some(delay);
                                warn!(error = %err, delay = ?delay, "accept failed, retrying");
                                tokio::select! {
                                    biased;
                                    _ = &mut shutdown => break,
                                    _ = tokio::time::sleep(delay) => {}
                                }
                                continue;
                            }
                            AcceptFailure::Fatal => {
                                connections.shutdown().await;
                                self.state.send_replace(ServerState::Stopped);
                                return Err(GatewayError::Listener(err));
                            }
                        },
                    };

                    let gateway = self.gateway.clone();
                    let service = service_fn(move |req| {
                        let gateway = gateway.clone();
                        async move { Ok::<_, Infallible>(gateway.handle(req, remote_addr).await) }
                    });
                    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);

                    connections.spawn(async move {
                        if let Err(err) = conn.await {
                            error!("Error serving connection: {:?}", err);
                        }
                    });
                }
            }
        }

        drop(listener);
        println!("{}", divider());
        info!("Shutting down server...");
        self.state.send_replace(ServerState::ShuttingDown);

        let grace = self.gateway.config.shutdown_grace;
        let result = match tokio::time::timeout(grace, graceful.shutdown()).await {
            Ok(()) => {
                info!("Server shut down");
                Ok(())
            }
            Err(_) => {
                warn!(grace = ?grace, "in-flight requests abandoned");
                Err(GatewayError::ForcedShutdown(grace))
            }
        };
        connections.shutdown().await;
        self.state.send_replace(ServerState::Stopped);
        result
    }
}

#[cfg(unix)]
const ENFILE: i32 = 23;
#[cfg(unix)]
const EMFILE: i32 = 24;

const MIN_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// What the accept loop does after a failed `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// The peer went away before the connection was accepted.
    Skip,
    /// Out of descriptors or otherwise temporarily unable to accept.
    Backoff,
    /// The listener itself is broken.
    Fatal,
}

fn classify_accept_error(err: &std::io::Error) -> AcceptFailure {
    use std::io::ErrorKind;

    #[cfg(unix)]
    if matches!(err.raw_os_error(), Some(EMFILE) | Some(ENFILE)) {
        return AcceptFailure::Backoff;
    }
    match err.kind() {
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted => {
            AcceptFailure::Skip
        }
        ErrorKind::ConnectionRefused | ErrorKind::WouldBlock | ErrorKind::OutOfMemory => {
            AcceptFailure::Backoff
        }
        _ => AcceptFailure::Fatal,
    }
}

/// Doubling delay between failed accepts, capped at one second.
fn next_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => MIN_BACKOFF,
        Some(delay) => (delay * 2).min(MAX_BACKOFF),
    }
}

impl Gateway {
    /// Handle one inbound request. Failures become error responses.
    async fn handle<B>(&self, req: Request<B>, remote_addr: SocketAddr) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        println!("{}", divider());
        let method = req.method().as_str().to_string();
        let path = req.uri().path().to_string();
        debug!("Handling request: {} {} from {}", method, path, remote_addr);

        let (route, params) = match self.routes.lookup(&method, &path) {
            Lookup::Matched { route, params } => (route, params),
            Lookup::MethodNotAllowed(allowed) => {
                warn!(method = %method, path = %path, "method not allowed");
                let mut response = error_response(StatusCode::METHOD_NOT_ALLOWED);
                if let Ok(allow) = HeaderValue::from_str(&allowed.join(", ")) {
                    response.headers_mut().insert(ALLOW, allow);
                }
                return response;
            }
            Lookup::NotFound => {
                warn!(method = %method, path = %path, "no route");
                return error_response(StatusCode::NOT_FOUND);
            }
        };

        info!("Handling request for: {}", route.path);
        info!("URL request path: {}", path);

        match self.dispatch(req, route, &params).await {
            Ok(response) => response,
            Err(err) => {
                error!(route = %route.path, error = %err, "request failed");
                error_response(err.status_code())
            }
        }
    }

    async fn dispatch<B>(
        &self,
        req: Request<B>,
        route: &Route,
        params: &std::collections::BTreeMap<String, String>,
    ) -> Result<Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let event = ApiEvent::from_request(req, route, params, self.config.max_body_size).await?;
        let payload = event.to_payload()?;
        let response = self.invoker.invoke(payload).await?;
        self.report(&response);
        translate(&response)
    }

    /// Print the function's result for the developer.
    fn report(&self, response: &InvokeResponse) {
        if let Some(err) = &response.error {
            error!(error_type = %err.error_type, "Lambda returned error");
            println!("{}", render_remote_error(err));
            return;
        }
        match render_payload(&response.payload, self.config.parse_json) {
            Some(out) => {
                info!("Lambda return:");
                println!("{out}");
            }
            None => debug!("Lambda returned non-JSON payload"),
        }
    }
}
