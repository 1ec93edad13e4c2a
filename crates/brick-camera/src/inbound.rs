//! Camera fed by a single client pushing frames over a WebSocket.
//!
//! The server runs on its own thread with a current-thread tokio runtime.
//! Callers talk to it only through channels: commands go in over an
//! unbounded tokio channel, replies come back over std channels so the
//! blocking side can wait with a timeout. Decoded frames land in a
//! [`FrameSlot`] that `read` pops from.

use crate::backend::CameraBackend;
use crate::config::{CameraConfig, FrameFormat};
use crate::queue::FrameSlot;
use crate::{CameraError, Frame};
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::mpsc::{self as sync_mpsc, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_websockets::{CloseCode, Message, ServerBuilder, WebSocketStream};

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const SHUTDOWN_ACK_TIMEOUT: Duration = Duration::from_secs(1);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const GOODBYE_GRACE: Duration = Duration::from_millis(100);
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

/// `code` of the rejection sent to a second client.
pub const BUSY_CODE: u16 = 1000;

/// Message for the connected client.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Binary(Vec<u8>),
    /// Serialized and sent as a text message.
    Json(serde_json::Value),
}

impl OutboundMessage {
    fn into_message(self) -> Message {
        match self {
            OutboundMessage::Text(text) => Message::text(text),
            OutboundMessage::Binary(bytes) => Message::binary(bytes),
            OutboundMessage::Json(value) => Message::text(value.to_string()),
        }
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        OutboundMessage::Text(text)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        OutboundMessage::Text(text.to_string())
    }
}

impl From<Vec<u8>> for OutboundMessage {
    fn from(bytes: Vec<u8>) -> Self {
        OutboundMessage::Binary(bytes)
    }
}

impl From<serde_json::Value> for OutboundMessage {
    fn from(value: serde_json::Value) -> Self {
        OutboundMessage::Json(value)
    }
}

#[derive(Serialize)]
struct Welcome<'a> {
    status: &'static str,
    message: &'static str,
    frame_format: &'a str,
    resolution: Option<[u32; 2]>,
    fps: u32,
}

#[derive(Serialize)]
struct Goodbye {
    status: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct Rejection {
    error: &'static str,
    message: &'static str,
    code: u16,
}

#[derive(Deserialize)]
struct JsonFrame {
    image: Option<String>,
    frame: Option<String>,
}

fn json_message<T: Serialize>(value: &T) -> Message {
    Message::text(serde_json::to_string(value).unwrap_or_default())
}

/// Pulls the compressed image bytes out of a client message.
pub(crate) fn extract_image_bytes(message: &Message, format: FrameFormat) -> Result<Vec<u8>, String> {
    let engine = &base64::engine::general_purpose::STANDARD;
    let raw: &[u8] = message.as_payload();

    match format {
        FrameFormat::Base64 => engine
            .decode(raw.trim_ascii())
            .map_err(|e| format!("invalid base64: {e}")),
        FrameFormat::Binary => Ok(raw.to_vec()),
        FrameFormat::Json => {
            let parsed: JsonFrame =
                serde_json::from_slice(raw).map_err(|e| format!("invalid JSON frame: {e}"))?;
            let encoded = parsed
                .image
                .or(parsed.frame)
                .ok_or_else(|| "JSON frame has no \"image\" or \"frame\" field".to_string())?;
            engine
                .decode(encoded.trim())
                .map_err(|e| format!("invalid base64 in JSON frame: {e}"))
        }
    }
}

type ReplySender = sync_mpsc::SyncSender<Result<(), CameraError>>;

enum Command {
    Send {
        message: OutboundMessage,
        reply: ReplySender,
    },
    Shutdown {
        reply: sync_mpsc::SyncSender<()>,
    },
}

enum ClientCommand {
    Deliver {
        message: OutboundMessage,
        reply: ReplySender,
    },
    Goodbye {
        done: oneshot::Sender<()>,
    },
}

enum ServerEvent {
    Handshaken {
        ws: WebSocketStream<TcpStream>,
        addr: SocketAddr,
    },
    Disconnected {
        id: u64,
    },
}

struct ClientHandle {
    id: u64,
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<ClientCommand>,
}

#[derive(Clone, Debug)]
struct Session {
    frame_format: FrameFormat,
    resolution: Option<(u32, u32)>,
    fps: u32,
    timeout: Duration,
}

struct ServerWorker {
    commands: mpsc::UnboundedSender<Command>,
    thread: JoinHandle<()>,
    finished: sync_mpsc::Receiver<()>,
    local_addr: SocketAddr,
}

/// Camera whose frames are pushed by a WebSocket client.
pub struct InboundSocketBackend {
    host: String,
    port: u16,
    session: Arc<Session>,
    frames: Arc<FrameSlot<Frame>>,
    worker: Option<ServerWorker>,
}

impl InboundSocketBackend {
    /// Server on `host:port`. Port 0 picks a free port, see [`InboundSocketBackend::local_addr`].
    pub fn new(host: impl Into<String>, port: u16, config: &CameraConfig) -> Self {
        Self {
            host: host.into(),
            port,
            session: Arc::new(Session {
                frame_format: config.frame_format(),
                resolution: config.resolution(),
                fps: config.fps(),
                timeout: config.timeout(),
            }),
            frames: Arc::new(FrameSlot::new()),
            worker: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn frame_format(&self) -> FrameFormat {
        self.session.frame_format
    }

    /// Address the server is bound to, while open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.worker.as_ref().map(|w| w.local_addr)
    }

    /// Sends `message` to the connected client and waits for the write.
    pub fn send_message(&self, message: impl Into<OutboundMessage>) -> Result<(), CameraError> {
        let not_running = || CameraError::Send("WebSocket server event loop is not running".to_string());
        let worker = self.worker.as_ref().ok_or_else(not_running)?;

        let (reply_tx, reply_rx) = sync_mpsc::sync_channel(1);
        worker
            .commands
            .send(Command::Send {
                message: message.into(),
                reply: reply_tx,
            })
            .map_err(|_| not_running())?;

        match reply_rx.recv_timeout(SEND_TIMEOUT) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CameraError::Send(format!(
                "no answer from the event loop within {SEND_TIMEOUT:?}"
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::Send(
                "client went away before the message was sent".to_string(),
            )),
        }
    }
}

impl CameraBackend for InboundSocketBackend {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn open(&mut self) -> Result<(), CameraError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = sync_mpsc::sync_channel(1);
        let (finished_tx, finished_rx) = sync_mpsc::sync_channel(1);

        let host = self.host.clone();
        let port = self.port;
        let session = self.session.clone();
        let frames = self.frames.clone();
        let thread = thread::Builder::new()
            .name(format!("ws-camera-{port}"))
            .spawn(move || {
                run_server_thread(host, port, session, frames, commands_rx, ready_tx);
                let _ = finished_tx.send(());
            })
            .map_err(|e| CameraError::Open(format!("cannot spawn WebSocket server thread: {e}")))?;

        match ready_rx.recv_timeout(self.session.timeout) {
            Ok(Ok(local_addr)) => {
                self.worker = Some(ServerWorker {
                    commands: commands_tx,
                    thread,
                    finished: finished_rx,
                    local_addr,
                });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = thread.join();
                Err(CameraError::Open(format!(
                    "Failed to start WebSocket server on {}:{}: {reason}",
                    self.host, self.port
                )))
            }
            Err(e) => {
                let (reply, _) = sync_mpsc::sync_channel(1);
                let _ = commands_tx.send(Command::Shutdown { reply });
                Err(CameraError::Open(format!(
                    "WebSocket server on {}:{} did not start: {e}",
                    self.host, self.port
                )))
            }
        }
    }

    fn close(&mut self) -> Result<(), CameraError> {
        let Some(worker) = self.worker.take() else {
            self.frames.drain();
            return Ok(());
        };

        let (reply_tx, reply_rx) = sync_mpsc::sync_channel(1);
        if worker.commands.send(Command::Shutdown { reply: reply_tx }).is_ok() {
            if let Err(e) = reply_rx.recv_timeout(SHUTDOWN_ACK_TIMEOUT) {
                log::warn!("WebSocket server did not acknowledge shutdown: {e}");
            }
        }

        match worker.finished.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.thread.join().is_err() {
                    log::warn!("WebSocket server thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => log::warn!(
                "WebSocket server thread did not stop within {JOIN_TIMEOUT:?}, detaching it"
            ),
        }

        self.frames.drain();
        log::info!("WebSocket camera server on {} closed", worker.local_addr);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, CameraError> {
        Ok(self.frames.pop_with_timeout(READ_TIMEOUT))
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        self.session.resolution
    }

    fn fps(&self) -> u32 {
        self.session.fps
    }
}

impl Drop for InboundSocketBackend {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.close();
        }
    }
}

fn run_server_thread(
    host: String,
    port: u16,
    session: Arc<Session>,
    frames: Arc<FrameSlot<Frame>>,
    commands: mpsc::UnboundedReceiver<Command>,
    ready: sync_mpsc::SyncSender<Result<SocketAddr, String>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(format!("cannot start event loop: {e}")));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match TcpListener::bind((host.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        if ready.send(Ok(local_addr)).is_err() {
            return;
        }

        log::info!("WebSocket camera server started on {local_addr}");
        serve(listener, session, frames, commands).await;
        log::info!("WebSocket camera server on {local_addr} stopped");
    });

    // lets in-flight decodes finish
    runtime.shutdown_timeout(GOODBYE_GRACE);
}

/// Owns the client slot. Admission is decided here and only here.
async fn serve(
    listener: TcpListener,
    session: Arc<Session>,
    frames: Arc<FrameSlot<Frame>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut client: Option<ClientHandle> = None;
    let mut next_id: u64 = 0;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((tcp, addr)) => {
                    tokio::spawn(handshake(tcp, addr, session.timeout, events_tx.clone()));
                }
                Err(e) => {
                    log::warn!("Accept error: {e}");
                    tokio::time::sleep(ACCEPT_RETRY).await;
                }
            },
            Some(event) = events.recv() => match event {
                ServerEvent::Handshaken { ws, addr } => {
                    if client.is_some() {
                        log::warn!("Rejecting client {addr}: only one client allowed at a time");
                        tokio::spawn(reject_busy(ws, addr));
                        continue;
                    }
                    next_id += 1;
                    let (client_tx, client_rx) = mpsc::unbounded_channel();
                    log::info!("Client connected: {addr}");
                    tokio::spawn(run_session(
                        next_id,
                        ws,
                        addr,
                        client_rx,
                        session.clone(),
                        frames.clone(),
                        events_tx.clone(),
                    ));
                    client = Some(ClientHandle { id: next_id, addr, commands: client_tx });
                }
                ServerEvent::Disconnected { id } => {
                    if let Some(gone) = client.take_if(|c| c.id == id) {
                        log::info!("Client removed: {}", gone.addr);
                    }
                }
            },
            command = commands.recv() => match command {
                Some(Command::Send { message, reply }) => {
                    let Some(current) = &client else {
                        let _ = reply.send(Err(CameraError::Send(
                            "No client connected to send message to".to_string(),
                        )));
                        continue;
                    };
                    let delivery = ClientCommand::Deliver { message, reply };
                    if let Err(mpsc::error::SendError(ClientCommand::Deliver { reply, .. })) =
                        current.commands.send(delivery)
                    {
                        let _ = reply.send(Err(CameraError::Send(format!(
                            "client {} is disconnecting",
                            current.addr
                        ))));
                    }
                }
                Some(Command::Shutdown { reply }) => {
                    let _ = reply.send(());
                    if let Some(current) = client.take() {
                        say_goodbye(current).await;
                    }
                    break;
                }
                None => break,
            }
        }
    }
}

async fn handshake(
    tcp: TcpStream,
    addr: SocketAddr,
    timeout: Duration,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    match tokio::time::timeout(timeout, ServerBuilder::new().accept(tcp)).await {
        Ok(Ok((_request, ws))) => {
            let _ = events.send(ServerEvent::Handshaken { ws, addr });
        }
        Ok(Err(e)) => log::warn!("WebSocket handshake failed for {addr}: {e}"),
        Err(_) => log::warn!("WebSocket handshake with {addr} timed out"),
    }
}

async fn reject_busy(mut ws: WebSocketStream<TcpStream>, addr: SocketAddr) {
    let rejection = json_message(&Rejection {
        error: "Server busy",
        message: "Only one client connection allowed at a time",
        code: BUSY_CODE,
    });
    let close = Message::close(
        Some(CloseCode::NORMAL_CLOSURE),
        "Server busy - only one client allowed",
    );

    if let Err(e) = ws.send(rejection).await {
        log::warn!("Error sending rejection message to {addr}: {e}");
        return;
    }
    if let Err(e) = ws.send(close).await {
        log::warn!("Error closing rejected client {addr}: {e}");
        return;
    }
    // wait for the close echo
    let _ = tokio::time::timeout(SHUTDOWN_ACK_TIMEOUT, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
}

async fn say_goodbye(client: ClientHandle) {
    let (done_tx, done_rx) = oneshot::channel();
    if client
        .commands
        .send(ClientCommand::Goodbye { done: done_tx })
        .is_err()
    {
        return;
    }
    if tokio::time::timeout(SHUTDOWN_ACK_TIMEOUT, done_rx).await.is_err() {
        log::warn!("Client {} was not closed in time", client.addr);
    }
}

async fn run_session(
    id: u64,
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    session: Arc<Session>,
    frames: Arc<FrameSlot<Frame>>,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let (mut sink, mut stream) = ws.split();

    let welcome = json_message(&Welcome {
        status: "connected",
        message: "You are now connected to the camera server",
        frame_format: session.frame_format.as_str(),
        resolution: session.resolution.map(|(w, h)| [w, h]),
        fps: session.fps,
    });
    if let Err(e) = sink.send(welcome).await {
        log::warn!("Could not send welcome message to {addr}: {e}");
    }

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(message)) => {
                    if message.is_close() {
                        log::info!("Client disconnected: {addr}");
                        // the next poll flushes the close reply and then yields None
                        let _ = tokio::time::timeout(GOODBYE_GRACE, async {
                            while let Some(Ok(_)) = stream.next().await {}
                        })
                        .await;
                        break;
                    }
                    if message.is_text() || message.is_binary() {
                        accept_frame(&message, &session, &frames, addr).await;
                    }
                }
                Some(Err(e)) => {
                    log::warn!("Error handling client {addr}: {e}");
                    break;
                }
                None => {
                    log::info!("Client disconnected: {addr}");
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(ClientCommand::Deliver { message, reply }) => {
                    let result = sink
                        .send(message.into_message())
                        .await
                        .map_err(|e| CameraError::Send(format!("sending to {addr} failed: {e}")));
                    let _ = reply.send(result);
                }
                Some(ClientCommand::Goodbye { done }) => {
                    let goodbye = json_message(&Goodbye {
                        status: "disconnecting",
                        message: "Server is shutting down. Connection will be closed.",
                    });
                    if let Err(e) = sink.send(goodbye).await {
                        log::warn!("Error sending goodbye to {addr}: {e}");
                    }
                    tokio::time::sleep(GOODBYE_GRACE).await;
                    if let Err(e) = sink.close().await {
                        log::debug!("Closing {addr}: {e}");
                    }
                    let _ = done.send(());
                    break;
                }
                None => break,
            }
        }
    }

    let _ = events.send(ServerEvent::Disconnected { id });
}

async fn accept_frame(
    message: &Message,
    session: &Session,
    frames: &FrameSlot<Frame>,
    addr: SocketAddr,
) {
    let bytes = match extract_image_bytes(message, session.frame_format) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Error parsing message from {addr}: {e}");
            return;
        }
    };
    match brick_image::decode_image_async(bytes).await {
        Ok(frame) => {
            if frames.try_push_evicting_oldest(frame).is_some() {
                log::trace!("Dropped stale frame from {addr}");
            }
        }
        Err(e) => log::warn!("Undecodable frame from {addr}: {e}"),
    }
}
