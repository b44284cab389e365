//! Shared data models for the ReelForge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes and their per-stage result records
//! - Audio timing reconciliation (fit classification)
//! - Stage option structs with documented defaults
//! - Timestamp formatting for reports and subtitle tracks

pub mod options;
pub mod report;
pub mod scene;
pub mod timing;

// Re-export common types
pub use options::{
    Orientation, RenderOptions, Resolution, ResolutionPreset, SegmentOptions, SpeechOptions,
    VisualOptions,
};
pub use report::StageResponse;
pub use scene::{
    classify_fit, Dimensions, FitQuality, MediaKind, Scene, SceneAudio, SceneVisual, TimingFit,
    VisualAsset,
};
pub use timing::{format_timestamp, format_vtt_time};
