use brick_base::{log, log_fatal};
use clap::Parser;
use ws_streamer::{stream_session, FrameSource, Options, SessionEnd, RECONNECT_DELAY};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    brick_base::init_stdout_logger();

    let options = Options::parse();
    log::info!(
        "Starting streamer to {} ({} fps, quality {})",
        options.url,
        options.fps,
        options.quality
    );
    let source = match FrameSource::open(&options) {
        Ok(source) => source,
        Err(e) => log_fatal!("Failed to open frame source: {}", e),
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received interrupt signal, shutting down...");
                break;
            }
            result = stream_session(&options, &source) => {
                match result {
                    Ok(SessionEnd::Busy) => log::warn!("Server already has a producer"),
                    Ok(end) => log::info!("Session ended: {:?}", end),
                    Err(e) => log::error!("WebSocket error: {e}"),
                }
                log::info!("Reconnecting in {:?}...", RECONNECT_DELAY);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    source.stop();
    log::info!("Streamer stopped");
    Ok(())
}
