//! Client connection management.
//!
//! A [`Client`] owns one TCP connection, a background read loop, and a
//! pending-call map keyed by request id, so multiple in-flight calls can
//! share the connection and still receive their own responses.

use crate::error::ClientError;
use bytes::BytesMut;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use wirecall_protocol::{
    CompressKind, Decoder, Encoder, Frame, FrameBody, MessageType, RpcRequest, RpcResponse,
    SerializeKind, DEFAULT_PORT,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Bounded attempt count used by the retrying proxy.
    pub retries: u32,
    /// Dial timeout, also the per-call response deadline.
    pub connect_timeout: Duration,
    /// Body encoding for outgoing requests.
    pub serialize: SerializeKind,
    /// Body compression for outgoing requests.
    pub compress: CompressKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            retries: 3,
            connect_timeout: Duration::from_secs(5),
            serialize: SerializeKind::MessagePack,
            compress: CompressKind::Gzip,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_serialize(mut self, serialize: SerializeKind) -> Self {
        self.serialize = serialize;
        self
    }

    pub fn with_compress(mut self, compress: CompressKind) -> Self {
        self.compress = compress;
        self
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A connection to a wirecall server.
pub struct Client {
    config: ClientConfig,
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// In-flight calls waiting for their response, keyed by request id.
    pending: Mutex<HashMap<u64, oneshot::Sender<Frame>>>,
    /// Next request id for this client instance.
    next_id: AtomicU64,
    connected: AtomicBool,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Dials the configured address with the dial timeout and spawns the
    /// background read loop. Dial failures are not retried here; retry is
    /// the proxy's responsibility.
    pub async fn connect(config: ClientConfig) -> Result<Arc<Self>, ClientError> {
        let addr = config.addr();
        tracing::debug!("connecting to {}", addr);

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)?
            .map_err(ClientError::Io)?;
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();

        let client = Arc::new(Self {
            config,
            writer: Mutex::new(Some(write_half)),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            read_task: Mutex::new(None),
        });

        let reader = client.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = reader.read_loop(read_half).await {
                tracing::debug!("read loop ended: {}", e);
            }
        });
        *client.read_task.lock().await = Some(task);

        Ok(client)
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sends a request and waits for the correlated response.
    pub async fn invoke(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<RpcResponse, ClientError> {
        let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest::new(request_id, service, method, args);
        let encoded =
            Encoder::encode_request(&request, self.config.serialize, self.config.compress)?;

        let frame = self.send_and_wait(request_id, encoded).await?;
        match frame.body {
            FrameBody::Response(response) => Ok(response),
            _ => Err(ClientError::UnexpectedFrame(frame.header.message_type)),
        }
    }

    /// Checks connection liveness with a ping frame.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let encoded = Encoder::encode_control(MessageType::Ping, request_id);

        let frame = self.send_and_wait(request_id, encoded).await?;
        match frame.header.message_type {
            MessageType::Pong => Ok(()),
            other => Err(ClientError::UnexpectedFrame(other)),
        }
    }

    /// Registers a pending entry, writes the frame, and waits for the read
    /// loop to deliver the reply with `connect_timeout` as the deadline.
    async fn send_and_wait(
        &self,
        request_id: u64,
        encoded: BytesMut,
    ) -> Result<Frame, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);

        {
            let mut writer = self.writer.lock().await;
            let writer = writer.as_mut().ok_or(ClientError::NotConnected)?;
            if let Err(e) = writer.write_all(&encoded).await {
                self.pending.lock().await.remove(&request_id);
                return Err(ClientError::Io(e));
            }
        }
        tracing::debug!("sent request id={} ({} bytes)", request_id, encoded.len());

        match tokio::time::timeout(self.config.connect_timeout, rx).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Reads frames and routes them to waiting callers by request id.
    async fn read_loop(&self, mut read_half: OwnedReadHalf) -> Result<(), ClientError> {
        let mut decoder = Decoder::new();
        let mut buf = [0u8; 8192];

        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!("connection closed by server");
                    self.disconnect().await;
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) => {
                    self.disconnect().await;
                    return Err(ClientError::Io(e));
                }
            };
            decoder.extend(&buf[..n]);

            loop {
                match decoder.decode_frame() {
                    Ok(Some(frame)) => match frame.header.message_type {
                        MessageType::Response | MessageType::Pong => {
                            let id = frame.header.request_id;
                            match self.pending.lock().await.remove(&id) {
                                Some(tx) => {
                                    let _ = tx.send(frame);
                                }
                                None => tracing::debug!("no pending call for id={}", id),
                            }
                        }
                        other => {
                            tracing::warn!("ignoring unexpected {:?} frame from server", other)
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        // Desynchronized stream; nothing further can be
                        // decoded from this connection.
                        self.disconnect().await;
                        return Err(e.into());
                    }
                }
            }
        }
    }

    /// Marks the client disconnected and wakes every in-flight call by
    /// dropping its pending sender.
    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }

    /// Closes the connection and stops the read loop.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        self.pending.lock().await.clear();
    }
}
