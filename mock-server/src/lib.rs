//! Stub HTTP server for exercising HTTP clients.
//!
//! Stubs pair a `RequestPattern` with a `ResponseDefinition`; responses can
//! be delayed, templated, or replaced by a socket-level `Fault`. Every
//! non-admin request is recorded so tests can verify what was sent.
//!
//! Async hosts call `serve`/`run` with their own listener. Synchronous tests
//! use `MockServer::spawn`, which runs the server on a dedicated thread and
//! stops it when the handle is dropped.

pub mod admin;
mod connection;
pub mod error;
pub mod journal;
pub mod state;
pub mod stub;
pub mod template;

use std::future::Future;
use std::net::SocketAddr;
use std::thread::JoinHandle;

use log::{error, info, warn};
use tokio::{net::TcpListener, sync::oneshot};
use uuid::Uuid;

pub use connection::NO_MATCH_BODY;
pub use error::ServerError;
pub use journal::RecordedRequest;
pub use state::{MockState, SharedState};
pub use stub::{BodyPattern, Delay, Fault, RequestPattern, ResponseDefinition, StringMatcher, Stub, UrlPattern};

/// Serve until the listener fails fatally. Never returns otherwise.
pub async fn run(listener: TcpListener, state: SharedState) -> Result<(), std::io::Error> {
    serve(listener, state, std::future::pending()).await
}

/// Serve until `shutdown` resolves. In-flight connections are abandoned.
pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    shutdown: impl Future<Output = ()>,
) -> Result<(), std::io::Error> {
    let admin = admin::router(state.clone());
    info!("mock server listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("mock server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };
                let state = state.clone();
                let admin = admin.clone();
                tokio::spawn(async move {
                    if let Err(e) = connection::handle(stream, state, admin).await {
                        warn!("connection from {peer}: {e}");
                    }
                });
            }
        }
    }
}

/// Load a JSON array of stubs, e.g. from a mappings file.
pub fn load_mappings(state: &MockState, json: &str) -> Result<Vec<Stub>, ServerError> {
    let stubs: Vec<Stub> = serde_json::from_str(json)?;
    stubs.into_iter().map(|stub| state.register(stub)).collect()
}

/// A server on `127.0.0.1` with an ephemeral port, driven by its own thread.
pub struct MockServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn spawn() -> Result<Self, ServerError> {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = std_listener.local_addr()?;
        std_listener.set_nonblocking(true)?;

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let state = SharedState::default();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_state = state.clone();
        let thread = std::thread::Builder::new()
            .name(format!("mock-server-{}", addr.port()))
            .spawn(move || {
                let result: Result<(), std::io::Error> = runtime.block_on(async move {
                    let listener = TcpListener::from_std(std_listener)?;
                    serve(listener, server_state, async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                });
                if let Err(e) = result {
                    error!("mock server on {addr} stopped: {e}");
                }
            })?;

        Ok(Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL without a trailing slash, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn stub_for(&self, stub: Stub) -> Result<Uuid, ServerError> {
        self.state.register(stub).map(|stub| stub.id)
    }

    pub fn reset(&self) {
        self.state.reset();
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests()
    }

    pub fn count_requests(&self, pattern: &RequestPattern) -> usize {
        self.state.count_requests(pattern)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_mappings_registers_every_stub() {
        let state = MockState::default();
        let stubs = load_mappings(
            &state,
            r#"[
                {"request": {"method": "GET", "url": {"path_equal": "/movieservice/v1/allMovies"}},
                 "response": {"status": 200, "body": "[]"}},
                {"request": {"url": "any"}, "response": {"status": 503}}
            ]"#,
        )
        .unwrap();
        assert_eq!(stubs.len(), 2);
        assert!(stubs.iter().all(|stub| !stub.id.is_nil()));
        assert_eq!(state.stubs().len(), 2);
    }

    #[test]
    fn load_mappings_rejects_bad_json() {
        let state = MockState::default();
        assert!(matches!(load_mappings(&state, "{"), Err(ServerError::Mappings(_))));
    }

    #[test]
    fn spawn_binds_ephemeral_port_and_stops_on_drop() {
        let server = MockServer::spawn().unwrap();
        assert_ne!(server.addr().port(), 0);
        assert!(server.url().starts_with("http://127.0.0.1:"));
        drop(server);
    }
}
