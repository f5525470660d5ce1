//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information parsed from FFmpeg's `-progress pipe:2` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current encode FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Whether encoding reported `progress=end`
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction complete in [0, 1] given the total duration in seconds.
    pub fn fraction(&self, total_duration_secs: f64) -> f64 {
        if total_duration_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0) / total_duration_secs).clamp(0.0, 1.0)
    }
}

/// Feed one line of `-progress` output into the accumulator.
///
/// Returns a snapshot when a `progress=` line closes a block.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();
    let (key, value) = line.split_once('=')?;

    match key {
        // ffmpeg emits microseconds under out_time_us and, in older builds,
        // the same value under out_time_ms
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed_str) = value.strip_suffix('x') {
                if let Ok(speed) = speed_str.parse() {
                    current.speed = speed;
                }
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block() {
        let mut p = FfmpegProgress::default();
        assert!(parse_progress_line("frame=120", &mut p).is_none());
        assert!(parse_progress_line("out_time_us=5000000", &mut p).is_none());
        assert!(parse_progress_line("speed=1.5x", &mut p).is_none());

        let snapshot = parse_progress_line("progress=continue", &mut p).unwrap();
        assert_eq!(snapshot.frame, 120);
        assert_eq!(snapshot.out_time_ms, 5000);
        assert!((snapshot.speed - 1.5).abs() < 0.01);
        assert!(!snapshot.is_complete);

        let end = parse_progress_line("progress=end", &mut p).unwrap();
        assert!(end.is_complete);
    }

    #[test]
    fn test_fraction() {
        let p = FfmpegProgress {
            out_time_ms: 5_000,
            ..Default::default()
        };
        assert!((p.fraction(10.0) - 0.5).abs() < 0.01);
        assert!((p.fraction(2.0) - 1.0).abs() < f64::EPSILON);
        assert_eq!(p.fraction(0.0), 0.0);
    }
}
