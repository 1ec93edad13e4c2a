use brick_camera::{CameraConfig, CameraError, CaptureFormat, FrameFormat};
use brick_image::ImageError;
use std::time::Duration;

#[test]
fn test_config_defaults() {
    let config = CameraConfig::default();
    assert_eq!(config.resolution(), Some((640, 480)));
    assert_eq!(config.fps(), 10);
    assert_eq!(config.timeout(), Duration::from_secs(10));
    assert_eq!(config.frame_format(), FrameFormat::Base64);
    assert_eq!(config.capture_format(), CaptureFormat::Mjpeg);
    assert_eq!(config.buffer_size(), 1);
    assert!(config.adjuster().is_none());
    assert!(config.username().is_none());
}

#[test]
fn test_config_builder() {
    let config = CameraConfig::default()
        .with_resolution(1280, 720)
        .with_fps(30)
        .with_username("admin")
        .with_password("secret")
        .with_frame_format(FrameFormat::Json)
        .with_capture_format(CaptureFormat::Yuyv)
        .with_buffer_size(0);

    assert_eq!(config.resolution(), Some((1280, 720)));
    assert_eq!(config.fps(), 30);
    assert_eq!(config.username(), Some("admin"));
    assert_eq!(config.password(), Some("secret"));
    assert_eq!(config.frame_format(), FrameFormat::Json);
    assert_eq!(config.capture_format(), CaptureFormat::Yuyv);
    // At least one buffer is always used
    assert_eq!(config.buffer_size(), 1);

    assert_eq!(config.with_auto_resolution().resolution(), None);
}

#[test]
fn test_config_debug_hides_password() {
    let config = CameraConfig::default().with_password("hunter2");
    let debug = format!("{:?}", config);
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("***"));
}

#[test]
fn test_frame_interval() {
    let config = CameraConfig::default().with_fps(4);
    assert_eq!(config.frame_interval(), Some(Duration::from_millis(250)));
    assert_eq!(config.with_fps(0).frame_interval(), None);
}

#[test]
fn test_adjuster_is_shared_between_clones() {
    let config = CameraConfig::default().with_adjuster(brick_image::greyscaled());
    let copy = config.clone();
    assert!(std::sync::Arc::ptr_eq(
        config.adjuster().unwrap(),
        copy.adjuster().unwrap()
    ));
}

#[test]
fn test_frame_format_parse() {
    assert_eq!("base64".parse::<FrameFormat>().unwrap(), FrameFormat::Base64);
    assert_eq!("BINARY".parse::<FrameFormat>().unwrap(), FrameFormat::Binary);
    assert_eq!("json".parse::<FrameFormat>().unwrap(), FrameFormat::Json);
    assert_eq!(FrameFormat::Json.to_string(), "json");

    match "xml".parse::<FrameFormat>() {
        Err(CameraError::Config(msg)) => assert!(msg.contains("xml")),
        other => panic!("Expected CameraError::Config, got {:?}", other),
    }
}

#[test]
fn test_capture_format_parse() {
    assert_eq!("MJPG".parse::<CaptureFormat>().unwrap(), CaptureFormat::Mjpeg);
    assert_eq!("yuyv".parse::<CaptureFormat>().unwrap(), CaptureFormat::Yuyv);
    assert!("h264".parse::<CaptureFormat>().is_err());
}

#[test]
fn test_from_image_error() {
    let img_err = ImageError::Decode("invalid JPEG".to_string());
    let cam_err: CameraError = img_err.into();

    match cam_err {
        CameraError::Transform(msg) => assert!(msg.contains("invalid JPEG")),
        _ => panic!("Expected CameraError::Transform variant"),
    }
}

#[test]
fn test_from_url_error() {
    let url_err = url::Url::parse("not a url").unwrap_err();
    let cam_err: CameraError = url_err.into();
    assert!(matches!(cam_err, CameraError::Config(_)));
}

#[test]
fn test_error_display() {
    let err = CameraError::Open("device busy".to_string());
    assert!(err.to_string().contains("device busy"));

    let err = CameraError::Transform("bad shape".to_string());
    assert_eq!(err.to_string(), "frame transformation failed: bad shape");

    let err = CameraError::Send("no client".to_string());
    assert!(err.to_string().contains("no client"));
}
