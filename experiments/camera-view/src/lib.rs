use brick_base::Tensor;

/// Packs an HWC RGB frame into `0x00RRGGBB` pixels for minifb.
///
/// Returns `None` when the frame is not `[H, W, 3]`.
pub fn frame_to_argb(frame: &Tensor<u8>) -> Option<Vec<u32>> {
    if frame.ndim() != 3 || frame.channels() != 3 {
        return None;
    }
    Some(
        frame
            .data
            .chunks_exact(3)
            .map(|px| ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32)
            .collect(),
    )
}

/// First command line argument as the camera source, `"0"` when absent.
pub fn source_from_args(mut args: impl Iterator<Item = String>) -> String {
    args.nth(1).unwrap_or_else(|| "0".to_string())
}
