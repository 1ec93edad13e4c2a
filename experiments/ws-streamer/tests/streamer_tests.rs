use base64::Engine;
use clap::Parser;
use brick_camera::{Camera, CameraConfig, FrameFormat};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use ws_streamer::{
    encode_frame, parse_server_message, stream_session, test_pattern, FrameSource,
    Options, ServerMessage, SessionEnd,
};

fn parse(list: &[&str]) -> Result<Options, clap::Error> {
    Options::try_parse_from(std::iter::once("ws-streamer").chain(list.iter().copied()))
}

#[test]
fn test_options_defaults() {
    let options = parse(&[]).unwrap();
    assert_eq!(options, Options::default());
    assert_eq!(options.url, "ws://localhost:8080");
    assert_eq!(options.camera, None);
}

#[test]
fn test_options_flags() {
    let options = parse(&[
        "--url", "ws://10.0.0.2:9000", "--camera", "/dev/video2", "--fps", "15", "--quality", "60",
        "--size", "320x240",
    ])
    .unwrap();
    assert_eq!(options.url, "ws://10.0.0.2:9000");
    assert_eq!(options.camera.as_deref(), Some("/dev/video2"));
    assert_eq!(options.fps, 15);
    assert_eq!(options.quality, 60);
    assert_eq!(options.size, (320, 240));
}

#[test]
fn test_options_errors() {
    assert!(parse(&["--fps"]).is_err());
    assert!(parse(&["--fps", "zero"]).is_err());
    assert!(parse(&["--fps", "0"]).is_err());
    assert!(parse(&["--quality", "101"]).is_err());
    assert!(parse(&["--size", "640"]).is_err());
    assert!(parse(&["--verbose"]).is_err());
}

#[test]
fn test_parse_server_messages() {
    let welcome = parse_server_message(
        r#"{"status":"connected","message":"hi","frame_format":"json","resolution":null,"fps":10}"#,
    );
    assert_eq!(
        welcome,
        ServerMessage::Welcome {
            frame_format: FrameFormat::Json
        }
    );
    assert!(!welcome.ends_session());

    let goodbye = parse_server_message(r#"{"status":"disconnecting","message":"bye"}"#);
    assert_eq!(goodbye, ServerMessage::Goodbye);
    assert!(goodbye.ends_session());

    let busy = parse_server_message(
        r#"{"error":"Server busy","message":"Only one client connection allowed at a time","code":1000}"#,
    );
    assert!(busy.ends_session());

    let other_error = parse_server_message(r#"{"error":"oops","code":4000}"#);
    assert_eq!(
        other_error,
        ServerMessage::Rejected {
            code: Some(4000),
            message: "oops".to_string()
        }
    );
    assert!(!other_error.ends_session());

    assert!(matches!(parse_server_message("plain text"), ServerMessage::Other(_)));
}

#[test]
fn test_encode_frame_formats() {
    let frame = test_pattern(16, 8, 3);

    let binary = encode_frame(&frame, FrameFormat::Binary, 80).unwrap();
    assert!(binary.is_binary());
    let decoded = brick_image::decode_image(binary.as_payload()).unwrap();
    assert_eq!(decoded.shape, vec![8, 16, 3]);

    let text = encode_frame(&frame, FrameFormat::Base64, 80).unwrap();
    let jpeg = base64::engine::general_purpose::STANDARD
        .decode(text.as_text().unwrap())
        .unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let json = encode_frame(&frame, FrameFormat::Json, 80).unwrap();
    let value: serde_json::Value = serde_json::from_str(json.as_text().unwrap()).unwrap();
    assert!(value["image"].is_string());
}

#[test]
fn test_pattern_moves() {
    let a = test_pattern(4, 2, 0);
    let b = test_pattern(4, 2, 1);
    assert_eq!(a.shape, vec![2, 4, 3]);
    assert_ne!(a.data, b.data);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_streams_into_inbound_camera() {
    let camera = Camera::new(
        "ws://127.0.0.1:0",
        CameraConfig::default()
            .with_fps(0)
            .with_frame_format(FrameFormat::Json),
    )
    .unwrap();
    camera.start().expect("start failed");
    let camera = Arc::new(camera);

    let options = Options {
        url: format!("ws://{}", camera.local_addr().unwrap()),
        fps: 20,
        size: (32, 24),
        ..Options::default()
    };
    let session = tokio::spawn(async move {
        let source = FrameSource::open(&options).unwrap();
        stream_session(&options, &source).await.map_err(|e| e.to_string())
    });

    let capturing = camera.clone();
    let frame = tokio::task::spawn_blocking(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(frame) = capturing.capture().unwrap() {
                return Some(frame);
            }
        }
        None
    })
    .await
    .unwrap()
    .expect("no frame arrived");
    assert_eq!(frame.shape, vec![24, 32, 3]);

    let stopping = camera.clone();
    tokio::task::spawn_blocking(move || stopping.stop())
        .await
        .unwrap();

    let end = timeout(Duration::from_secs(5), session)
        .await
        .expect("session did not end")
        .unwrap();
    assert_eq!(end, Ok(SessionEnd::Goodbye));
}
