//! Video encoding configuration and pipeline constants.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::options::Quality;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Thumbnail generation settings
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;
pub const THUMBNAIL_TIMESTAMP: &str = "00:00:01";

/// Face scan sampling rate: one frame per second of source video.
pub const FACE_SAMPLE_FPS: u32 = 1;
/// Padding added around the merged face bounding union, pixels.
pub const FACE_BLUR_PAD_PX: u32 = 24;
/// Box blur parameters for the obscured region.
pub const FACE_BLUR_RADIUS: u32 = 10;
pub const FACE_BLUR_POWER: u32 = 3;

/// Voice transform ratios. Deep lowers pitch by resampling down then
/// stretching tempo back; light is the inverse. Intensity is fixed.
pub const VOICE_DEEP_RATE: f64 = 0.89;
pub const VOICE_DEEP_TEMPO: f64 = 1.12;
pub const VOICE_LIGHT_RATE: f64 = 1.12;
pub const VOICE_LIGHT_TEMPO: f64 = 0.89;

/// Caption drawtext styling.
pub const CAPTION_FONT_SIZE: u32 = 36;
pub const CAPTION_BORDER_WIDTH: u32 = 3;
pub const CAPTION_BOTTOM_MARGIN: u32 = 80;

/// Words per caption segment (within the 6-10 window).
pub const CAPTION_WORDS_PER_SEGMENT: usize = 8;

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    #[validate(range(max = 51))]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    23
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

impl EncodingConfig {
    /// Configuration for a requested quality level.
    pub fn for_quality(quality: Quality) -> Self {
        let crf = match quality {
            Quality::Low => 28,
            Quality::Medium => 23,
            Quality::High => 18,
        };
        Self {
            crf,
            ..Default::default()
        }
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}
