//! TCP server implementation.

use crate::error::ServerError;
use crate::registry::{Service, ServiceRegistry};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use wirecall_protocol::{Decoder, Encoder, Frame, FrameBody, MessageType, DEFAULT_PORT};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(300),
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// Capacity of the per-connection response channel.
const RESPONSE_CHANNEL_CAPACITY: usize = 64;

/// TCP server for wirecall.
///
/// Services are registered before [`run`](Self::run); once connection
/// tasks share the registry it is frozen and further registration fails.
pub struct Server {
    config: ServerConfig,
    registry: Arc<ServiceRegistry>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            registry: Arc::new(ServiceRegistry::new()),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Registers a service. Fails with [`ServerError::DuplicateService`] on
    /// a name collision and with [`ServerError::AlreadyRunning`] once the
    /// registry has been shared with connection tasks.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        service: Service,
    ) -> Result<(), ServerError> {
        let registry = Arc::get_mut(&mut self.registry).ok_or(ServerError::AlreadyRunning)?;
        registry.register(name, service)
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serves connections from an already-bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let registry = self.registry.clone();
                            let stats = self.stats.clone();
                            let idle_timeout = self.config.idle_timeout;
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                tracing::debug!("client connected: {}", addr);

                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    registry,
                                    stats.clone(),
                                    idle_timeout,
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::debug!("client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Handles a single connection: decodes frames until the peer closes,
    /// an error occurs, or the idle timeout fires. Errors never escape to
    /// the accept loop.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<ServiceRegistry>,
        stats: Arc<ServerStats>,
        idle_timeout: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        stream.set_nodelay(true).ok();
        let (mut read_half, mut write_half) = stream.into_split();

        // Writer task: a slow peer stalls only its own responses, never the
        // decode loop.
        let (response_tx, mut response_rx) = mpsc::channel::<BytesMut>(RESPONSE_CHANNEL_CAPACITY);
        let writer = tokio::spawn(async move {
            while let Some(bytes) = response_rx.recv().await {
                if let Err(e) = write_half.write_all(&bytes).await {
                    tracing::debug!("[{}] write error: {}", addr, e);
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        });

        let result =
            Self::decode_loop(&mut read_half, addr, &registry, &stats, &response_tx, idle_timeout, shutdown)
                .await;

        // Let the writer drain queued responses, then stop it.
        drop(response_tx);
        let _ = writer.await;

        result
    }

    async fn decode_loop(
        read_half: &mut OwnedReadHalf,
        addr: SocketAddr,
        registry: &ServiceRegistry,
        stats: &ServerStats,
        response_tx: &mpsc::Sender<BytesMut>,
        idle_timeout: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let mut decoder = Decoder::new();
        let mut buf = [0u8; 8192];

        loop {
            tokio::select! {
                result = read_half.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] connection closed by peer", addr);
                            return Ok(());
                        }
                        Ok(n) => decoder.extend(&buf[..n]),
                        Err(e) => return Err(ServerError::Io(e)),
                    }
                }
                _ = tokio::time::sleep(idle_timeout) => {
                    tracing::debug!("[{}] idle timeout", addr);
                    return Ok(());
                }
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            // Process every complete frame before reading again.
            loop {
                match decoder.decode_frame() {
                    Ok(Some(frame)) => {
                        Self::handle_frame(frame, addr, registry, stats, response_tx).await?
                    }
                    Ok(None) => break,
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    /// Dispatches one decoded frame, delivering at most one response to the
    /// writer task.
    async fn handle_frame(
        frame: Frame,
        addr: SocketAddr,
        registry: &ServiceRegistry,
        stats: &ServerStats,
        response_tx: &mpsc::Sender<BytesMut>,
    ) -> Result<(), ServerError> {
        let encoded = match frame.body {
            FrameBody::Request(request) => {
                stats.requests_total.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "[{}] request {}.{} (id={})",
                    addr,
                    request.service,
                    request.method,
                    request.request_id
                );

                let response =
                    registry.dispatch(&request, frame.header.compress, frame.header.serialize);
                if response.is_error() {
                    tracing::debug!(
                        "[{}] request id={} failed: {}",
                        addr,
                        response.request_id,
                        response.message
                    );
                }
                Encoder::encode_response(&response)?
            }
            FrameBody::Empty if frame.header.message_type == MessageType::Ping => {
                Encoder::encode_control(MessageType::Pong, frame.header.request_id)
            }
            _ => {
                tracing::warn!(
                    "[{}] ignoring unexpected {:?} frame",
                    addr,
                    frame.header.message_type
                );
                return Ok(());
            }
        };

        response_tx
            .send(encoded)
            .await
            .map_err(|_| ServerError::WriterClosed)
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{arg, MethodError};
    use serde_json::json;
    use wirecall_protocol::{
        CompressKind, RpcRequest, SerializeKind, CODE_ERROR, CODE_OK, HEADER_SIZE,
    };

    fn test_service() -> Service {
        Service::new()
            .method("double", |args| {
                let n: i64 = arg(&args, 0)?;
                Ok(Some(json!(n * 2)))
            })
            .method("fail", |_args| Err(MethodError::new("boom")))
    }

    async fn start_server() -> (Arc<Server>, SocketAddr) {
        let mut server = Server::new(ServerConfig::default());
        server.register("calc", test_service()).unwrap();
        let server = Arc::new(server);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let serve = server.clone();
        tokio::spawn(async move {
            let _ = serve.serve(listener).await;
        });

        (server, addr)
    }

    /// Writes one frame and decodes one frame back over a raw socket.
    async fn round_trip(stream: &mut TcpStream, frame: &[u8]) -> Frame {
        stream.write_all(frame).await.unwrap();

        let mut decoder = Decoder::new();
        let mut buf = [0u8; 8192];
        loop {
            if let Some(frame) = decoder.decode_frame().unwrap() {
                return frame;
            }
            let n = stream.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "server closed the connection unexpectedly");
            decoder.extend(&buf[..n]);
        }
    }

    #[test]
    fn test_not_running_initially() {
        let server = Server::new(ServerConfig::default());
        assert!(!server.is_running());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut server = Server::new(ServerConfig::default());
        server.register("calc", test_service()).unwrap();
        let result = server.register("calc", test_service());
        assert!(matches!(result, Err(ServerError::DuplicateService(_))));
    }

    #[tokio::test]
    async fn test_dispatch_over_socket() {
        let (_server, addr) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let request = RpcRequest::new(1, "calc", "double", vec![json!(21)]);
        let encoded =
            Encoder::encode_request(&request, SerializeKind::MessagePack, CompressKind::Gzip)
                .unwrap();

        let frame = round_trip(&mut stream, &encoded).await;
        assert_eq!(frame.header.message_type, MessageType::Response);
        match frame.body {
            FrameBody::Response(response) => {
                assert_eq!(response.request_id, 1);
                assert_eq!(response.code, CODE_OK);
                assert_eq!(response.data, Some(json!(42)));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_service_over_socket() {
        let (_server, addr) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let request = RpcRequest::new(2, "missing", "double", vec![]);
        let encoded =
            Encoder::encode_request(&request, SerializeKind::Json, CompressKind::None).unwrap();

        let frame = round_trip(&mut stream, &encoded).await;
        match frame.body {
            FrameBody::Response(response) => {
                assert_eq!(response.code, CODE_ERROR);
                assert_eq!(response.message, "no service found");
                // Body strategies echo the inbound frame.
                assert_eq!(response.serialize, SerializeKind::Json);
                assert_eq!(response.compress, CompressKind::None);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multiple_requests_per_connection() {
        let (server, addr) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        for (id, n) in [(1u64, 3i64), (2, 5), (3, 7)] {
            let request = RpcRequest::new(id, "calc", "double", vec![json!(n)]);
            let encoded =
                Encoder::encode_request(&request, SerializeKind::MessagePack, CompressKind::Gzip)
                    .unwrap();
            let frame = round_trip(&mut stream, &encoded).await;
            assert_eq!(frame.header.request_id, id);
            match frame.body {
                FrameBody::Response(response) => assert_eq!(response.data, Some(json!(n * 2))),
                other => panic!("expected response, got {other:?}"),
            }
        }

        assert_eq!(server.stats().requests_total.load(Ordering::Relaxed), 3);
        assert_eq!(server.stats().connections_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        let (_server, addr) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let encoded = Encoder::encode_control(MessageType::Ping, 99);
        assert_eq!(encoded.len(), HEADER_SIZE);

        let frame = round_trip(&mut stream, &encoded).await;
        assert_eq!(frame.header.message_type, MessageType::Pong);
        assert_eq!(frame.header.request_id, 99);
        assert!(matches!(frame.body, FrameBody::Empty));
    }

    #[tokio::test]
    async fn test_bad_magic_closes_connection_only() {
        let (_server, addr) = start_server().await;

        let mut poisoned = TcpStream::connect(addr).await.unwrap();
        poisoned.write_all(&[0u8; HEADER_SIZE]).await.unwrap();
        let mut buf = [0u8; 16];
        // The server closes the desynchronized connection without a reply.
        let n = poisoned.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        // Other connections are unaffected.
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = RpcRequest::new(5, "calc", "double", vec![json!(2)]);
        let encoded =
            Encoder::encode_request(&request, SerializeKind::MessagePack, CompressKind::Gzip)
                .unwrap();
        let frame = round_trip(&mut stream, &encoded).await;
        assert_eq!(frame.header.request_id, 5);
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let (server, addr) = start_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        server.shutdown();

        // The accept loop exits and existing connections are torn down.
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if !server.is_running() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server did not stop");
        drop(stream);
    }
}
