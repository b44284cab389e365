//! Per-scene clip rendering.
//!
//! One encoder invocation combines a scene's visual asset and narration
//! track into a fixed-duration clip: the visual is looped, the audio muxed
//! in, and the frame scaled and padded to the target resolution with the
//! original aspect ratio preserved (centered letterbox/pillarbox).

use std::path::Path;
use tracing::info;

use reel_models::{MediaKind, RenderOptions};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::fs::verify_non_empty;

/// Build the scale+pad filter for a target resolution.
fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    )
}

/// Render one scene clip from a visual asset and a narration track.
///
/// The output is clamped to exactly `duration_secs`. The produced file is
/// verified to be non-empty; an empty or missing output is an error.
pub async fn render_scene_clip(
    visual_path: impl AsRef<Path>,
    visual_kind: MediaKind,
    audio_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    duration_secs: f64,
    options: &RenderOptions,
) -> MediaResult<u64> {
    let visual_path = visual_path.as_ref();
    let audio_path = audio_path.as_ref();
    let output_path = output_path.as_ref();

    info!(
        visual = %visual_path.display(),
        audio = %audio_path.display(),
        output = %output_path.display(),
        duration_secs,
        "Rendering scene clip"
    );

    let preset = options.resolution.preset();

    // Still images loop as a video source; video assets loop until the
    // duration clamp cuts them off.
    let loop_args: [&str; 2] = match visual_kind {
        MediaKind::Image => ["-loop", "1"],
        MediaKind::Video => ["-stream_loop", "-1"],
    };

    let cmd = FfmpegCommand::new(output_path)
        .input_with_args(loop_args, visual_path)
        .input(audio_path)
        .map("0:v:0")
        .map("1:a:0")
        .video_codec(&options.video_codec)
        .audio_codec(&options.audio_codec)
        .framerate(options.framerate)
        .video_filter(scale_pad_filter(preset.width, preset.height))
        .video_bitrate(preset.bitrate)
        .duration(duration_secs)
        .pixel_format("yuv420p");

    FfmpegRunner::new().run(&cmd).await?;

    let size = verify_non_empty(output_path).await?;

    info!(
        output = %output_path.display(),
        size_bytes = size,
        "Scene clip rendered"
    );

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_pad_filter_centers() {
        let filter = scale_pad_filter(1280, 720);
        assert!(filter.contains("scale=1280:720:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=1280:720:(ow-iw)/2:(oh-ih)/2"));
        assert!(filter.ends_with("setsar=1"));
    }

    #[test]
    fn test_render_args_for_image() {
        let options = RenderOptions::default();
        let preset = options.resolution.preset();
        let cmd = FfmpegCommand::new("out.mp4")
            .input_with_args(["-loop", "1"], "scene_1_image.jpg")
            .input("scene_1_audio.mp3")
            .map("0:v:0")
            .map("1:a:0")
            .video_codec(&options.video_codec)
            .video_bitrate(preset.bitrate)
            .duration(6.0);

        let args = cmd.build_args();
        assert!(args.contains(&"-loop".to_string()));
        assert!(args.contains(&"0:v:0".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert!(args.contains(&"2500k".to_string()));
    }
}
