//! Quality tier selection.

use tracing::debug;

use crate::device::device_tier;
use obscura_models::{DeviceTier, NetworkProfile, QualityTier};

/// Bandwidth at which the network half of the score saturates.
const BANDWIDTH_CEILING_MBPS: f64 = 20.0;

/// Select a tier from raw inputs.
///
/// `score = 50 * min(bandwidth / 20 Mbps, 1) + device_score / 2`, with
/// `device_score` on a 0-100 scale. Thresholds: >= 70 selects 1080p,
/// >= 40 selects 720p, anything lower 360p. Monotone in both inputs.
pub fn select_tier(bandwidth_mbps: f64, device_score: f64) -> QualityTier {
    let network_part = 50.0 * (bandwidth_mbps / BANDWIDTH_CEILING_MBPS).clamp(0.0, 1.0);
    let device_part = device_score.clamp(0.0, 100.0) / 2.0;
    let score = network_part + device_part;

    if score >= 70.0 {
        QualityTier::P1080
    } else if score >= 40.0 {
        QualityTier::P720
    } else {
        QualityTier::P360
    }
}

/// Tier selector bound to a device tier.
#[derive(Debug, Clone, Copy)]
pub struct QualitySelector {
    device: DeviceTier,
}

impl QualitySelector {
    /// Selector for an explicit device tier (tests, overrides).
    pub fn new(device: DeviceTier) -> Self {
        Self { device }
    }

    /// Selector for the detected device tier.
    pub fn for_this_device() -> Self {
        Self::new(device_tier())
    }

    /// Select the target tier for a network profile.
    pub fn select(&self, profile: &NetworkProfile) -> QualityTier {
        let tier = select_tier(profile.bandwidth_mbps, self.device.score());
        debug!(
            bandwidth_mbps = profile.bandwidth_mbps,
            device = self.device.as_str(),
            tier = tier.as_str(),
            "Selected quality tier"
        );
        tier
    }

    pub fn device(&self) -> DeviceTier {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_examples() {
        // High-tier device saturates the device half; 8 Mbps tips 1080p
        assert_eq!(select_tier(8.0, 100.0), QualityTier::P1080);
        assert_eq!(select_tier(7.0, 100.0), QualityTier::P720);
        // Low-end device on a weak link
        assert_eq!(select_tier(1.0, 30.0), QualityTier::P360);
        // Mid device needs moderate bandwidth for 720p
        assert_eq!(select_tier(5.0, 60.0), QualityTier::P720);
    }

    #[test]
    fn test_monotonic_in_bandwidth() {
        for device_score in [0.0, 30.0, 60.0, 100.0] {
            let mut prev = QualityTier::P360;
            for bw in 0..=40 {
                let tier = select_tier(bw as f64, device_score);
                assert!(tier >= prev, "tier regressed at bw={bw} score={device_score}");
                prev = tier;
            }
        }
    }

    #[test]
    fn test_monotonic_in_device_score() {
        for bw in [0.0, 2.0, 8.0, 20.0, 40.0] {
            let mut prev = QualityTier::P360;
            for score in 0..=100 {
                let tier = select_tier(bw, score as f64);
                assert!(tier >= prev, "tier regressed at bw={bw} score={score}");
                prev = tier;
            }
        }
    }

    #[test]
    fn test_bandwidth_saturates_at_ceiling() {
        assert_eq!(
            select_tier(20.0, 40.0),
            select_tier(1000.0, 40.0),
        );
    }
}
