//! Output quality tiers and device performance tiers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target output resolution tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    P360,
    P720,
    P1080,
}

impl QualityTier {
    /// Output frame height for this tier.
    pub fn height(&self) -> u32 {
        match self {
            QualityTier::P360 => 360,
            QualityTier::P720 => 720,
            QualityTier::P1080 => 1080,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::P360 => "360p",
            QualityTier::P720 => "720p",
            QualityTier::P1080 => "1080p",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device performance tier, derived once from total memory and treated as
/// immutable for the process lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTier {
    Low,
    Mid,
    High,
}

impl DeviceTier {
    /// Classify from total device memory in bytes.
    pub fn from_total_memory(total_bytes: u64) -> Self {
        const GIB: u64 = 1024 * 1024 * 1024;
        if total_bytes >= 6 * GIB {
            DeviceTier::High
        } else if total_bytes >= 4 * GIB {
            DeviceTier::Mid
        } else {
            DeviceTier::Low
        }
    }

    /// Performance score on a 0-100 scale, the selector's second input.
    pub fn score(&self) -> f64 {
        match self {
            DeviceTier::Low => 30.0,
            DeviceTier::Mid => 60.0,
            DeviceTier::High => 100.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTier::Low => "low",
            DeviceTier::Mid => "mid",
            DeviceTier::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_tier_from_memory() {
        assert_eq!(DeviceTier::from_total_memory(8 * GIB), DeviceTier::High);
        assert_eq!(DeviceTier::from_total_memory(6 * GIB), DeviceTier::High);
        assert_eq!(DeviceTier::from_total_memory(4 * GIB), DeviceTier::Mid);
        assert_eq!(DeviceTier::from_total_memory(2 * GIB), DeviceTier::Low);
    }

    #[test]
    fn test_score_is_monotone_in_tier() {
        assert!(DeviceTier::Low.score() < DeviceTier::Mid.score());
        assert!(DeviceTier::Mid.score() < DeviceTier::High.score());
    }

    #[test]
    fn test_tier_heights() {
        assert_eq!(QualityTier::P360.height(), 360);
        assert_eq!(QualityTier::P1080.height(), 1080);
        assert!(QualityTier::P360 < QualityTier::P720);
    }
}
