//! Processing option definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target output quality requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Smallest output, fastest encode
    Low,
    /// Balanced default
    #[default]
    Medium,
    /// Best quality, slowest encode
    High,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Voice pitch transform applied to the audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoiceEffect {
    /// Lower the pitch (resample down, stretch back to original duration)
    #[default]
    Deep,
    /// Raise the pitch (inverse ratios)
    Light,
}

impl VoiceEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceEffect::Deep => "deep",
            VoiceEffect::Light => "light",
        }
    }
}

/// Where processing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Only the on-device engine
    Local,
    /// Only the remote processing service
    Server,
    /// Local first, one remote retry on local failure
    #[default]
    Hybrid,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Local => "local",
            ExecutionMode::Server => "server",
            ExecutionMode::Hybrid => "hybrid",
        }
    }
}

/// Error parsing an option enum from a string.
#[derive(Debug, Error)]
#[error("unrecognized option value: {0}")]
pub struct ParseOptionError(String);

impl FromStr for Quality {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(ParseOptionError(other.to_string())),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ExecutionMode::Local),
            "server" => Ok(ExecutionMode::Server),
            "hybrid" => Ok(ExecutionMode::Hybrid),
            other => Err(ParseOptionError(other.to_string())),
        }
    }
}

/// Options controlling a processing job.
///
/// Unknown keys are rejected at deserialization time rather than silently
/// ignored, so a typo in a client payload fails loudly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// Obscure detected face regions in the output
    #[serde(default = "default_true")]
    pub enable_face_blur: bool,

    /// Apply the voice pitch transform
    #[serde(default = "default_true")]
    pub enable_voice_change: bool,

    /// Transcribe speech and burn in captions
    #[serde(default)]
    pub enable_transcription: bool,

    /// Target output quality
    #[serde(default)]
    pub quality: Quality,

    /// Pitch direction when voice change is enabled
    #[serde(default)]
    pub voice_effect: VoiceEffect,

    /// Execution environment selection
    #[serde(default)]
    pub mode: ExecutionMode,
}

fn default_true() -> bool {
    true
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            enable_face_blur: true,
            enable_voice_change: true,
            enable_transcription: false,
            quality: Quality::default(),
            voice_effect: VoiceEffect::default(),
            mode: ExecutionMode::default(),
        }
    }
}

impl ProcessingOptions {
    /// Options with every transform disabled (pass-through transcode).
    pub fn passthrough() -> Self {
        Self {
            enable_face_blur: false,
            enable_voice_change: false,
            enable_transcription: false,
            ..Default::default()
        }
    }
}
