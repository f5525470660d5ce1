//! Filter graph construction.
//!
//! Every transformation stage emits a description here; the graph is handed
//! to a single FFmpeg invocation by the engine. No stage writes media
//! itself.

use obscura_models::encoding::{
    CAPTION_BORDER_WIDTH, CAPTION_BOTTOM_MARGIN, CAPTION_FONT_SIZE, FACE_BLUR_POWER,
    FACE_BLUR_RADIUS, VOICE_DEEP_RATE, VOICE_DEEP_TEMPO, VOICE_LIGHT_RATE, VOICE_LIGHT_TEMPO,
};
use obscura_models::{CaptionSegment, FaceRegion, VoiceEffect};

/// Default audio sample rate assumed when the source has no probed rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A combined audio/video filter description for one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    /// Labeled video chain `[0:v]...[vout]`, if any video filtering applies
    pub video: Option<String>,
    /// Simple audio chain for `-af`, if any audio filtering applies
    pub audio: Option<String>,
}

impl FilterGraph {
    /// Output pad label used by the video chain.
    pub const VIDEO_OUT: &'static str = "vout";

    /// Whether the graph mentions a filter directive by name.
    pub fn contains(&self, directive: &str) -> bool {
        self.video.as_deref().is_some_and(|v| v.contains(directive))
            || self.audio.as_deref().is_some_and(|a| a.contains(directive))
    }

    /// Whether the graph is a pure pass-through.
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}

/// What to obscure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlurSpec {
    /// A fixed pixel region of the frame
    Region(FaceRegion),
    /// Policy fallback: the top half of the frame, expressed with frame
    /// expressions so unprobed sources work too
    TopHalf,
}

/// Builder assembling the per-job filter graph from stage outputs.
#[derive(Debug, Clone)]
pub struct FilterGraphBuilder {
    blur: Option<BlurSpec>,
    captions: Vec<CaptionSegment>,
    voice: Option<VoiceEffect>,
    target_height: Option<u32>,
    sample_rate: u32,
}

impl FilterGraphBuilder {
    pub fn new() -> Self {
        Self {
            blur: None,
            captions: Vec::new(),
            voice: None,
            target_height: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Obscure a region of the frame for the whole clip.
    pub fn blur_region(mut self, region: FaceRegion) -> Self {
        if !region.is_empty() {
            self.blur = Some(BlurSpec::Region(region));
        }
        self
    }

    /// Obscure the top half of the frame (zero-detection policy fallback).
    pub fn blur_top_half(mut self) -> Self {
        self.blur = Some(BlurSpec::TopHalf);
        self
    }

    /// Apply a blur spec directly.
    pub fn blur(self, spec: BlurSpec) -> Self {
        match spec {
            BlurSpec::Region(region) => self.blur_region(region),
            BlurSpec::TopHalf => self.blur_top_half(),
        }
    }

    /// Burn in caption overlays.
    pub fn captions(mut self, segments: &[CaptionSegment]) -> Self {
        self.captions = segments.to_vec();
        self
    }

    /// Apply the fixed pitch transform.
    pub fn voice_effect(mut self, effect: VoiceEffect) -> Self {
        self.voice = Some(effect);
        self
    }

    /// Scale output to a target height (aspect preserved, width even).
    pub fn scale_to_height(mut self, height: u32) -> Self {
        self.target_height = Some(height);
        self
    }

    /// Audio sample rate of the source, used by the pitch transform.
    pub fn sample_rate(mut self, rate: u32) -> Self {
        if rate > 0 {
            self.sample_rate = rate;
        }
        self
    }

    /// Assemble the graph.
    pub fn build(&self) -> FilterGraph {
        FilterGraph {
            video: self.build_video_chain(),
            audio: self.build_audio_chain(),
        }
    }

    fn build_video_chain(&self) -> Option<String> {
        let mut stages: Vec<String> = Vec::new();

        if let Some(spec) = self.blur {
            // Blur a copy of the region and composite it back in place.
            let (w, h, x, y) = match spec {
                BlurSpec::Region(region) => (
                    region.width.to_string(),
                    region.height.to_string(),
                    region.x.to_string(),
                    region.y.to_string(),
                ),
                BlurSpec::TopHalf => (
                    "iw".to_string(),
                    "ih/2".to_string(),
                    "0".to_string(),
                    "0".to_string(),
                ),
            };
            stages.push(format!(
                "split=2[base][blursrc];\
                 [blursrc]crop={w}:{h}:{x}:{y},boxblur=luma_radius={r}:luma_power={p}[blurred];\
                 [base][blurred]overlay={x}:{y}",
                r = FACE_BLUR_RADIUS,
                p = FACE_BLUR_POWER,
            ));
        }

        for segment in &self.captions {
            stages.push(caption_drawtext(segment));
        }

        if let Some(height) = self.target_height {
            stages.push(format!("scale=-2:{height}"));
        }

        if stages.is_empty() {
            return None;
        }

        Some(format!(
            "[0:v]{}[{}]",
            stages.join(","),
            FilterGraph::VIDEO_OUT
        ))
    }

    fn build_audio_chain(&self) -> Option<String> {
        let (rate_ratio, tempo) = match self.voice? {
            VoiceEffect::Deep => (VOICE_DEEP_RATE, VOICE_DEEP_TEMPO),
            VoiceEffect::Light => (VOICE_LIGHT_RATE, VOICE_LIGHT_TEMPO),
        };

        // Resample to shift pitch, restore the clock rate, then stretch
        // tempo back so the duration is unchanged.
        Some(format!(
            "asetrate={sr}*{rate_ratio},aresample={sr},atempo={tempo}",
            sr = self.sample_rate,
        ))
    }
}

impl Default for FilterGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a single drawtext overlay for a caption segment: bottom-center,
/// white fill with a black outline, time-gated to the segment window.
fn caption_drawtext(segment: &CaptionSegment) -> String {
    format!(
        "drawtext=text='{text}':fontsize={size}:fontcolor=white:\
         borderw={bw}:bordercolor=black:\
         x=(w-text_w)/2:y=h-text_h-{margin}:\
         enable='between(t\\,{start:.3}\\,{end:.3})'",
        text = escape_drawtext(&segment.text),
        size = CAPTION_FONT_SIZE,
        bw = CAPTION_BORDER_WIDTH,
        margin = CAPTION_BOTTOM_MARGIN,
        start = segment.start_time,
        end = segment.end_time,
    )
}

/// Escape text for use inside a quoted drawtext `text=` value.
///
/// The filter-graph parser and drawtext each consume one level of
/// escaping, so special characters need a backslash.
fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\\\'"),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\%"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Build the thumbnail scale filter.
pub fn filter_thumbnail(width: u32) -> String {
    format!("scale={width}:-2")
}
