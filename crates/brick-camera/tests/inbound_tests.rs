use base64::Engine;
use brick_camera::{Camera, CameraConfig, CameraError, Frame, FrameFormat};
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_websockets::{ClientBuilder, CloseCode, Message, WebSocketStream};

fn start_server(config: CameraConfig) -> (Arc<Camera>, String) {
    let camera = Camera::new("ws://127.0.0.1:0", config).expect("camera failed");
    camera.start().expect("start failed");
    let addr = camera.local_addr().expect("no bound address");
    (Arc::new(camera), format!("ws://{}", addr))
}

async fn connect(uri: &str) -> WebSocketStream<impl AsyncRead + AsyncWrite + Unpin> {
    let (client, _) = ClientBuilder::from_uri(uri.parse::<http::Uri>().unwrap())
        .connect()
        .await
        .expect("connect failed");
    client
}

async fn next_json<S>(client: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_websockets::Error>> + Unpin,
{
    let message = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("recv timed out")
        .expect("stream ended")
        .expect("recv failed");
    serde_json::from_str(message.as_text().expect("expected text message")).unwrap()
}

async fn capture_within(camera: &Arc<Camera>, wait: Duration) -> Option<Frame> {
    let camera = camera.clone();
    tokio::task::spawn_blocking(move || {
        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            if let Some(frame) = camera.capture().expect("capture failed") {
                return Some(frame);
            }
        }
        None
    })
    .await
    .unwrap()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = crates_image::RgbImage::from_pixel(width, height, crates_image::Rgb([255, 0, 0]));
    let mut bytes = Vec::new();
    crates_image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), crates_image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bound_address_and_welcome() {
    let (camera, uri) = start_server(CameraConfig::default().with_frame_format(FrameFormat::Json));
    let addr = camera.local_addr().unwrap();
    assert_eq!(addr.ip().to_string(), "127.0.0.1");
    assert!(addr.port() > 0);

    let mut client = connect(&uri).await;
    let welcome = next_json(&mut client).await;
    assert_eq!(welcome["status"], "connected");
    assert_eq!(welcome["message"], "You are now connected to the camera server");
    assert_eq!(welcome["frame_format"], "json");
    assert_eq!(welcome["resolution"], json!([640, 480]));
    assert_eq!(welcome["fps"], 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_welcome_without_resolution() {
    let (_camera, uri) = start_server(CameraConfig::default().with_auto_resolution());
    let mut client = connect(&uri).await;
    let welcome = next_json(&mut client).await;
    assert!(welcome["resolution"].is_null());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_base64_frame_is_captured() {
    let (camera, uri) = start_server(CameraConfig::default().with_fps(0));
    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    client
        .send(Message::text(b64(&png_bytes(4, 3))))
        .await
        .expect("send failed");

    let frame = capture_within(&camera, Duration::from_secs(5))
        .await
        .expect("no frame captured");
    assert_eq!(frame.shape, vec![3, 4, 3]);
    assert_eq!(frame.pixel(0, 0).unwrap(), &[255, 0, 0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_json_image_frame_is_captured() {
    let config = CameraConfig::default()
        .with_fps(0)
        .with_frame_format(FrameFormat::Json);
    let (camera, uri) = start_server(config);
    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    let payload = json!({ "image": b64(&png_bytes(1, 1)) });
    client
        .send(Message::text(payload.to_string()))
        .await
        .expect("send failed");

    let frame = capture_within(&camera, Duration::from_secs(5))
        .await
        .expect("no frame captured");
    assert_eq!(frame.shape, vec![1, 1, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_frame_is_captured() {
    let config = CameraConfig::default()
        .with_fps(0)
        .with_frame_format(FrameFormat::Binary);
    let (camera, uri) = start_server(config);
    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    client
        .send(Message::binary(png_bytes(2, 5)))
        .await
        .expect("send failed");

    let frame = capture_within(&camera, Duration::from_secs(5))
        .await
        .expect("no frame captured");
    assert_eq!(frame.shape, vec![5, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_message_is_ignored() {
    let (camera, uri) = start_server(CameraConfig::default().with_fps(0));
    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    client
        .send(Message::text("definitely not an image".to_string()))
        .await
        .expect("send failed");
    assert!(capture_within(&camera, Duration::from_millis(300)).await.is_none());

    // The session survives and later frames still arrive
    client
        .send(Message::text(b64(&png_bytes(2, 2))))
        .await
        .expect("send failed");
    assert!(capture_within(&camera, Duration::from_secs(5)).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_only_newest_frame_is_kept() {
    let (camera, uri) = start_server(CameraConfig::default().with_fps(0));
    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    client
        .send(Message::text(b64(&png_bytes(1, 1))))
        .await
        .expect("send failed");
    client
        .send(Message::text(b64(&png_bytes(2, 2))))
        .await
        .expect("send failed");
    sleep(Duration::from_millis(500)).await; // Let both frames be decoded

    let frame = capture_within(&camera, Duration::from_secs(1))
        .await
        .expect("no frame captured");
    assert_eq!(frame.shape, vec![2, 2, 3]);
    assert!(capture_within(&camera, Duration::from_millis(200)).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_client_is_rejected() {
    let (camera, uri) = start_server(CameraConfig::default().with_fps(0));
    let mut first = connect(&uri).await;
    next_json(&mut first).await;

    let mut second = connect(&uri).await;
    let rejection = next_json(&mut second).await;
    assert_eq!(rejection["error"], "Server busy");
    assert_eq!(rejection["message"], "Only one client connection allowed at a time");
    assert_eq!(rejection["code"], 1000);

    match timeout(Duration::from_secs(5), second.next()).await {
        Ok(Some(Ok(message))) => assert!(message.is_close()),
        Ok(Some(Err(_))) | Ok(None) => {}
        Err(_) => panic!("rejected client was not closed"),
    }

    // The first session is unaffected
    first
        .send(Message::text(b64(&png_bytes(3, 3))))
        .await
        .expect("send failed");
    assert!(capture_within(&camera, Duration::from_secs(5)).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slot_frees_after_disconnect() {
    let (_camera, uri) = start_server(CameraConfig::default());
    let mut first = connect(&uri).await;
    next_json(&mut first).await;
    first.close().await.expect("close failed");
    drop(first);
    sleep(Duration::from_millis(200)).await;

    let mut second = connect(&uri).await;
    let welcome = next_json(&mut second).await;
    assert_eq!(welcome["status"], "connected");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_close_is_answered() {
    let (_camera, uri) = start_server(CameraConfig::default());
    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    client
        .send(Message::close(Some(CloseCode::NORMAL_CLOSURE), "done"))
        .await
        .expect("send close failed");

    let reply = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("close reply timed out")
        .expect("socket dropped without a close reply")
        .expect("recv failed");
    assert!(reply.is_close());
    assert_eq!(reply.as_close().map(|(code, _)| code), Some(CloseCode::NORMAL_CLOSURE));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_goodbye_on_stop() {
    let (camera, uri) = start_server(CameraConfig::default());
    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    let stopper = camera.clone();
    let stopped = tokio::task::spawn_blocking(move || stopper.stop());

    let goodbye = next_json(&mut client).await;
    assert_eq!(goodbye["status"], "disconnecting");
    assert_eq!(
        goodbye["message"],
        "Server is shutting down. Connection will be closed."
    );

    stopped.await.unwrap();
    assert!(!camera.is_started());
    assert!(camera.local_addr().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_send_message_to_client() {
    let (camera, uri) = start_server(CameraConfig::default());

    let sender = camera.clone();
    let result = tokio::task::spawn_blocking(move || sender.send_message("hello"))
        .await
        .unwrap();
    match result {
        Err(CameraError::Send(msg)) => assert!(msg.contains("No client connected")),
        other => panic!("Expected CameraError::Send, got {:?}", other),
    }

    let mut client = connect(&uri).await;
    next_json(&mut client).await;

    let sender = camera.clone();
    tokio::task::spawn_blocking(move || sender.send_message(json!({ "cmd": "snapshot" })))
        .await
        .unwrap()
        .expect("send_message failed");

    let received = next_json(&mut client).await;
    assert_eq!(received, json!({ "cmd": "snapshot" }));
}

#[test]
fn test_send_message_when_stopped() {
    let camera = Camera::new("ws://127.0.0.1:0", CameraConfig::default()).unwrap();
    match camera.send_message("hello") {
        Err(CameraError::Send(msg)) => assert!(msg.contains("not running")),
        other => panic!("Expected CameraError::Send, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restart_binds_again() {
    let (camera, _uri) = start_server(CameraConfig::default());
    camera.stop();
    assert!(camera.local_addr().is_none());

    camera.start().expect("restart failed");
    let uri = format!("ws://{}", camera.local_addr().unwrap());
    let mut client = connect(&uri).await;
    assert_eq!(next_json(&mut client).await["status"], "connected");
}

#[test]
fn test_bind_failure_is_open_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("bind failed");
    let port = taken.local_addr().unwrap().port();

    let camera = Camera::new(format!("ws://127.0.0.1:{}", port), CameraConfig::default()).unwrap();
    match camera.start() {
        Err(CameraError::Open(msg)) => assert!(msg.contains(&port.to_string())),
        other => panic!("Expected CameraError::Open, got {:?}", other),
    }
    assert!(!camera.is_started());
}
