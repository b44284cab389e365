//! Scene records and per-stage result types.
//!
//! A [`Scene`] is created by the segmenter and enriched in place by each
//! subsequent stage. Scene ids are 1-based, dense, and define playback order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reconciliation tolerance between synthesized and target duration (seconds).
pub const FIT_TOLERANCE_SECS: f64 = 0.5;

/// Reading speed used for `estimated_reading_time` (words per second).
pub const READING_WORDS_PER_SEC: f64 = 3.0;

/// One narrated segment of the output video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// 1-based sequential id; ordering by id is the narrative order.
    pub id: u32,
    /// Cleaned narration text.
    pub text: String,
    /// Word count derived from `text`.
    pub word_count: usize,
    /// Estimated reading time in seconds.
    pub estimated_reading_time: u32,
    /// Target display duration in seconds (input contract, not measured).
    pub duration: f64,

    /// General keyword set (lowercase, deduplicated, capped at 6).
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Top-3 ranked keywords driving visual search.
    #[serde(default)]
    pub primary_keywords: Vec<String>,
    /// First named entities found in the text (capped at 3).
    #[serde(default)]
    pub entities: Vec<String>,
    /// Descriptive adjectives usable as visual hints (capped at 3).
    #[serde(default)]
    pub visual_concepts: Vec<String>,

    /// Audio synthesis result, set by the audio stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<SceneAudio>,
    /// Visual resolution result, set by the visuals stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<SceneVisual>,
    /// Ceiling of measured audio duration; authoritative for rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<u32>,
}

impl Scene {
    /// Create a new scene from cleaned text.
    pub fn new(id: u32, text: impl Into<String>, duration: f64) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        let estimated_reading_time =
            (word_count as f64 / READING_WORDS_PER_SEC).ceil().max(1.0) as u32;

        Self {
            id,
            text,
            word_count,
            estimated_reading_time,
            duration,
            keywords: Vec::new(),
            primary_keywords: Vec::new(),
            entities: Vec::new(),
            visual_concepts: Vec::new(),
            audio: None,
            visual: None,
            actual_duration: None,
        }
    }

    /// Path of the synthesized narration file, if synthesis succeeded.
    pub fn audio_path(&self) -> Option<&Path> {
        self.audio
            .as_ref()
            .filter(|a| a.success)
            .and_then(|a| a.file_path.as_deref())
    }

    /// Path of the downloaded visual asset, if the download succeeded.
    pub fn visual_path(&self) -> Option<&Path> {
        self.visual
            .as_ref()
            .filter(|v| v.selected.download_success)
            .and_then(|v| v.selected.local_path.as_deref())
    }

    /// Set `actual_duration` from a measured audio duration.
    ///
    /// Durations are clamped to at least 1 second so no clip is zero-length.
    pub fn set_actual_duration(&mut self, audio_secs: f64) {
        self.actual_duration = Some(audio_secs.ceil().max(1.0) as u32);
    }

    /// The duration the renderer must use: measured when available,
    /// otherwise the original target.
    pub fn render_duration(&self) -> f64 {
        self.actual_duration
            .map(|d| d as f64)
            .unwrap_or(self.duration)
            .max(1.0)
    }
}

/// Audio synthesis result for one scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAudio {
    /// Whether synthesis produced a usable file.
    pub success: bool,
    /// Path to the narration file (`scene_<id>_audio.mp3`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// File name component of `file_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Size of the produced file in bytes.
    #[serde(default)]
    pub file_size: u64,
    /// Measured duration in seconds (0 on failure).
    pub duration: f64,
    /// Text-based duration estimate in seconds.
    pub estimated_duration: f64,
    /// Text actually sent to the synthesis capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_text: Option<String>,
    /// Target duration the audio was reconciled against.
    pub target_duration: f64,
    /// Reconciliation verdict against the target duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<TimingFit>,
    /// Qualitative ratio bucket for the fit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_quality: Option<FitQuality>,
    /// Seconds of silence padding the renderer would need.
    #[serde(default)]
    pub padding_needed: f64,
    /// Seconds of overrun the renderer would need to trim.
    #[serde(default)]
    pub trimming_needed: f64,
    /// Failure message, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SceneAudio {
    /// Build an error record. Failed scenes carry `duration: 0` so the
    /// caller can decide whether to skip or substitute.
    pub fn failed(error: impl Into<String>, estimated_duration: f64, target: f64) -> Self {
        Self {
            success: false,
            file_path: None,
            file_name: None,
            file_size: 0,
            duration: 0.0,
            estimated_duration,
            cleaned_text: None,
            target_duration: target,
            fit: None,
            fit_quality: None,
            padding_needed: 0.0,
            trimming_needed: 0.0,
            error: Some(error.into()),
        }
    }

    /// Reconcile the measured duration against the target.
    ///
    /// Advisory only: classification is recorded for the renderer and
    /// compiler, no audio is edited here.
    pub fn reconcile(&mut self, target: f64) {
        self.target_duration = target;
        self.fit = Some(classify_fit(self.duration, target, FIT_TOLERANCE_SECS));
        self.fit_quality = Some(FitQuality::from_ratio(self.duration, target));
        self.padding_needed = (target - self.duration).max(0.0);
        self.trimming_needed = (self.duration - target).max(0.0);
    }
}

/// Reconciliation verdict between synthesized and target duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingFit {
    PerfectFit,
    PaddingNeeded,
    TrimNeeded,
}

impl std::fmt::Display for TimingFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerfectFit => write!(f, "perfect-fit"),
            Self::PaddingNeeded => write!(f, "padding-needed"),
            Self::TrimNeeded => write!(f, "trim-needed"),
        }
    }
}

/// Classify how a measured duration relates to its target.
///
/// Pure function of `(actual, target, tolerance)`.
pub fn classify_fit(actual: f64, target: f64, tolerance: f64) -> TimingFit {
    if actual > target + tolerance {
        TimingFit::TrimNeeded
    } else if actual < target - tolerance {
        TimingFit::PaddingNeeded
    } else {
        TimingFit::PerfectFit
    }
}

/// Qualitative bucket for how closely audio matches its target duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl FitQuality {
    /// Bucket the actual/target ratio.
    pub fn from_ratio(actual: f64, target: f64) -> Self {
        if target <= 0.0 {
            return Self::Poor;
        }
        let ratio = actual / target;
        if (0.95..=1.05).contains(&ratio) {
            Self::Excellent
        } else if (0.85..=1.15).contains(&ratio) {
            Self::Good
        } else if (0.7..=1.3).contains(&ratio) {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Visual resolution result for one scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneVisual {
    /// The selected (and downloaded) asset.
    pub selected: VisualAsset,
    /// Runner-up candidates, capped at 3. Not downloaded.
    #[serde(default)]
    pub alternatives: Vec<VisualAsset>,
    /// The primary search query used.
    pub search_query: String,
    /// Total candidates considered across all queries.
    pub search_results: usize,
    /// Human-readable reason the selected asset won.
    pub selection_reason: String,
}

/// Media kind of a visual asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// File extension used for downloaded assets of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Pixel dimensions of a visual asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Portrait aspect ratio (height over width). Values above 1.0 are
    /// taller than wide.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        self.height as f64 / self.width as f64
    }
}

/// A selected or alternative visual asset on a scene record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualAsset {
    /// Source-assigned id (or `fallback_<scene>` for the fixed fallback).
    pub id: String,
    pub kind: MediaKind,
    /// Remote URL the asset is fetched from.
    pub download_url: String,
    /// Source description/alt text.
    #[serde(default)]
    pub description: String,
    /// Creator credited by the source.
    #[serde(default)]
    pub photographer: String,
    pub dimensions: Dimensions,
    /// Source-reported duration, video assets only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Combined ranking score at selection time.
    #[serde(default)]
    pub total_score: f64,
    /// True when this is the fixed fallback asset.
    #[serde(default)]
    pub is_fallback: bool,

    /// Local path after download (`scene_<id>_<type>.<ext>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    /// Whether the download produced a usable local file.
    #[serde(default)]
    pub download_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_new_derives_counts() {
        let scene = Scene::new(1, "The sun rose over the quiet city.", 6.0);
        assert_eq!(scene.id, 1);
        assert_eq!(scene.word_count, 7);
        assert!(scene.estimated_reading_time >= 1);
        assert!(scene.audio.is_none());
    }

    #[test]
    fn test_classify_fit_perfect() {
        assert_eq!(classify_fit(6.0, 6.0, 0.5), TimingFit::PerfectFit);
        assert_eq!(classify_fit(6.4, 6.0, 0.5), TimingFit::PerfectFit);
        assert_eq!(classify_fit(5.6, 6.0, 0.5), TimingFit::PerfectFit);
    }

    #[test]
    fn test_classify_fit_trim_and_pad() {
        assert_eq!(classify_fit(8.0, 6.0, 0.5), TimingFit::TrimNeeded);
        assert_eq!(classify_fit(4.0, 6.0, 0.5), TimingFit::PaddingNeeded);
    }

    #[test]
    fn test_fit_quality_buckets() {
        assert_eq!(FitQuality::from_ratio(6.0, 6.0), FitQuality::Excellent);
        assert_eq!(FitQuality::from_ratio(6.6, 6.0), FitQuality::Good);
        assert_eq!(FitQuality::from_ratio(7.5, 6.0), FitQuality::Fair);
        assert_eq!(FitQuality::from_ratio(12.0, 6.0), FitQuality::Poor);
        assert_eq!(FitQuality::from_ratio(1.0, 0.0), FitQuality::Poor);
    }

    #[test]
    fn test_reconcile_records_padding() {
        let mut audio = SceneAudio {
            success: true,
            file_path: Some(PathBuf::from("/tmp/scene_1_audio.mp3")),
            file_name: Some("scene_1_audio.mp3".to_string()),
            file_size: 4000,
            duration: 4.0,
            estimated_duration: 4.2,
            cleaned_text: None,
            target_duration: 0.0,
            fit: None,
            fit_quality: None,
            padding_needed: 0.0,
            trimming_needed: 0.0,
            error: None,
        };
        audio.reconcile(6.0);
        assert_eq!(audio.fit, Some(TimingFit::PaddingNeeded));
        assert!((audio.padding_needed - 2.0).abs() < 1e-9);
        assert_eq!(audio.trimming_needed, 0.0);
    }

    #[test]
    fn test_actual_duration_clamped_to_one() {
        let mut scene = Scene::new(1, "Hi.", 6.0);
        scene.set_actual_duration(0.2);
        assert_eq!(scene.actual_duration, Some(1));
        assert!((scene.render_duration() - 1.0).abs() < 1e-9);

        scene.set_actual_duration(6.3);
        assert_eq!(scene.actual_duration, Some(7));
    }

    #[test]
    fn test_audio_path_requires_success() {
        let mut scene = Scene::new(1, "Hello world.", 6.0);
        scene.audio = Some(SceneAudio::failed("tts down", 2.0, 6.0));
        assert!(scene.audio_path().is_none());
    }

    #[test]
    fn test_scene_serialization_roundtrip() {
        let mut scene = Scene::new(2, "A lone bicycle rider pedaled down Main Street.", 6.0);
        scene.keywords = vec!["bicycle".into(), "street".into()];
        scene.primary_keywords = vec!["bicycle".into()];

        let json = serde_json::to_string(&scene).unwrap();
        let back: Scene = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 2);
        assert_eq!(back.primary_keywords, vec!["bicycle".to_string()]);
        assert!(back.actual_duration.is_none());
    }
}
