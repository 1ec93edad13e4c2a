use brick_base::{log, log_fatal};
use brick_camera::{Camera, CameraConfig};
use brick_image::letterboxed;
use camera_view::{frame_to_argb, source_from_args};
use minifb::{Key, Window, WindowOptions};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    brick_base::init_stdout_logger();

    let source = source_from_args(std::env::args());
    log::info!("Camera View");
    log::info!("Source: {}, requested {}x{}", source, WIDTH, HEIGHT);
    log::info!("Controls: ESC to exit");

    let config = CameraConfig::default()
        .with_resolution(WIDTH, HEIGHT)
        .with_fps(30)
        .with_adjuster(letterboxed(Some((WIDTH, HEIGHT))));
    let camera = match Camera::new(source.as_str(), config) {
        Ok(camera) => camera,
        Err(e) => log_fatal!("Cannot use camera {}: {}", source, e),
    };
    if let Err(e) = camera.start() {
        log_fatal!("Failed to start camera {}: {}", source, e);
    }
    log::info!("Camera ready ({})", camera.backend_name());

    let mut window = Window::new(
        "Camera View - ESC to exit",
        WIDTH as usize,
        HEIGHT as usize,
        WindowOptions {
            ..WindowOptions::default()
        },
    )?;
    window.set_target_fps(30);

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let Some(frame) = camera.capture()? else {
            window.update();
            continue;
        };

        let Some(argb) = frame_to_argb(&frame) else {
            log::warn!("Expected [H, W, 3] frame shape, got {:?}", frame.shape);
            continue;
        };
        window.update_with_buffer(&argb, frame.width(), frame.height())?;
    }

    log::info!("Exiting...");
    camera.stop();
    Ok(())
}
