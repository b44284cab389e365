//! Stage option structs with documented defaults.

use serde::{Deserialize, Serialize};

/// Default target display duration per scene (seconds).
pub const DEFAULT_SCENE_DURATION_SECS: f64 = 6.0;
/// Default minimum scene length in characters.
pub const DEFAULT_MIN_SCENE_LENGTH: usize = 80;
/// Default soft maximum scene length in characters.
pub const DEFAULT_MAX_SCENE_LENGTH: usize = 250;
/// Narration speed assumed when estimating speech time from text.
pub const DEFAULT_WORDS_PER_SECOND: f64 = 2.5;

/// Default narration language.
pub const DEFAULT_LANGUAGE: &str = "en";
/// Default TTS retry attempts.
pub const DEFAULT_TTS_RETRIES: u32 = 3;
/// Default delay between TTS retries (milliseconds).
pub const DEFAULT_TTS_RETRY_DELAY_MS: u64 = 1000;

/// Default candidate cap per scene for visual search.
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 15;

/// Default output framerate.
pub const DEFAULT_FRAMERATE: u32 = 30;
/// Default video codec (H.264).
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec.
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default output container format.
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp4";

/// Options for the scene segmentation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// Minimum scene length in characters.
    #[serde(default = "default_min_scene_length")]
    pub min_scene_length: usize,
    /// Soft maximum scene length in characters. A scene may exceed this
    /// while it is still under `min_scene_length`.
    #[serde(default = "default_max_scene_length")]
    pub max_scene_length: usize,
    /// Desired scene count for the semantic strategy. When unset, a count
    /// is derived from the text length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_scene_count: Option<usize>,
    /// Target display duration assigned to every scene (seconds).
    #[serde(default = "default_scene_duration")]
    pub scene_duration_secs: f64,
    /// Narration speed used for the speech-time sanity check.
    #[serde(default = "default_words_per_second")]
    pub words_per_second: f64,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            min_scene_length: DEFAULT_MIN_SCENE_LENGTH,
            max_scene_length: DEFAULT_MAX_SCENE_LENGTH,
            target_scene_count: None,
            scene_duration_secs: DEFAULT_SCENE_DURATION_SECS,
            words_per_second: DEFAULT_WORDS_PER_SECOND,
        }
    }
}

/// Options for the audio synthesis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechOptions {
    /// Narration language code (e.g. "en").
    #[serde(default = "default_language")]
    pub language: String,
    /// Request slower narration from the synthesis capability.
    #[serde(default)]
    pub slow: bool,
    /// Target duration each scene's audio is reconciled against.
    #[serde(default = "default_scene_duration")]
    pub scene_duration_secs: f64,
    /// Synthesis retry attempts per scene.
    #[serde(default = "default_tts_retries")]
    pub max_retries: u32,
    /// Base delay between retries (milliseconds, linear backoff).
    #[serde(default = "default_tts_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            slow: false,
            scene_duration_secs: DEFAULT_SCENE_DURATION_SECS,
            max_retries: DEFAULT_TTS_RETRIES,
            retry_delay_ms: DEFAULT_TTS_RETRY_DELAY_MS,
        }
    }
}

/// Requested orientation for visual assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
    Square,
}

impl Orientation {
    /// Query-parameter value expected by the search capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
            Self::Square => "square",
        }
    }
}

/// Options for the visual resolution stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualOptions {
    /// Asset orientation requested from the search capability.
    #[serde(default = "default_orientation")]
    pub orientation: Orientation,
    /// Also search video assets when photo results are thin.
    #[serde(default)]
    pub prefer_videos: bool,
    /// Candidate cap across all queries for one scene.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Penalize photographers already used this run.
    #[serde(default = "default_true")]
    pub ensure_diversity: bool,
}

impl Default for VisualOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            prefer_videos: false,
            max_results: DEFAULT_MAX_SEARCH_RESULTS,
            ensure_diversity: true,
        }
    }
}

/// Output resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

/// Concrete encode parameters for a [`Resolution`].
#[derive(Debug, Clone, Copy)]
pub struct ResolutionPreset {
    pub width: u32,
    pub height: u32,
    pub bitrate: &'static str,
}

impl Resolution {
    /// Width/height/bitrate for this preset.
    pub fn preset(&self) -> ResolutionPreset {
        match self {
            Self::P480 => ResolutionPreset {
                width: 854,
                height: 480,
                bitrate: "1000k",
            },
            Self::P720 => ResolutionPreset {
                width: 1280,
                height: 720,
                bitrate: "2500k",
            },
            Self::P1080 => ResolutionPreset {
                width: 1920,
                height: 1080,
                bitrate: "4000k",
            },
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P480 => write!(f, "480p"),
            Self::P720 => write!(f, "720p"),
            Self::P1080 => write!(f, "1080p"),
        }
    }
}

/// Options for the render and compile stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_resolution")]
    pub resolution: Resolution,
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    /// Generate the master WebVTT subtitle track during compilation.
    #[serde(default = "default_true")]
    pub include_subtitles: bool,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::P720,
            framerate: DEFAULT_FRAMERATE,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            include_subtitles: true,
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }
}

fn default_min_scene_length() -> usize {
    DEFAULT_MIN_SCENE_LENGTH
}
fn default_max_scene_length() -> usize {
    DEFAULT_MAX_SCENE_LENGTH
}
fn default_scene_duration() -> f64 {
    DEFAULT_SCENE_DURATION_SECS
}
fn default_words_per_second() -> f64 {
    DEFAULT_WORDS_PER_SECOND
}
fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}
fn default_tts_retries() -> u32 {
    DEFAULT_TTS_RETRIES
}
fn default_tts_retry_delay() -> u64 {
    DEFAULT_TTS_RETRY_DELAY_MS
}
fn default_orientation() -> Orientation {
    Orientation::Portrait
}
fn default_max_results() -> usize {
    DEFAULT_MAX_SEARCH_RESULTS
}
fn default_resolution() -> Resolution {
    Resolution::P720
}
fn default_framerate() -> u32 {
    DEFAULT_FRAMERATE
}
fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_defaults() {
        let opts = SegmentOptions::default();
        assert_eq!(opts.min_scene_length, 80);
        assert_eq!(opts.max_scene_length, 250);
        assert!((opts.scene_duration_secs - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_presets() {
        let p = Resolution::P720.preset();
        assert_eq!((p.width, p.height), (1280, 720));
        assert_eq!(p.bitrate, "2500k");

        let p = Resolution::P1080.preset();
        assert_eq!((p.width, p.height), (1920, 1080));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: VisualOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.orientation, Orientation::Portrait);
        assert_eq!(opts.max_results, 15);
        assert!(opts.ensure_diversity);
        assert!(!opts.prefer_videos);
    }

    #[test]
    fn test_resolution_serde_names() {
        let json = serde_json::to_string(&Resolution::P1080).unwrap();
        assert_eq!(json, "\"1080p\"");
        let back: Resolution = serde_json::from_str("\"480p\"").unwrap();
        assert_eq!(back, Resolution::P480);
    }
}
