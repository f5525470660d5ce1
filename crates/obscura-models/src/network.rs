//! Network condition model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Coarse connection quality classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl NetworkQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkQuality::Poor => "poor",
            NetworkQuality::Fair => "fair",
            NetworkQuality::Good => "good",
            NetworkQuality::Excellent => "excellent",
        }
    }
}

/// A point-in-time network measurement. Refreshed on connectivity changes,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NetworkProfile {
    /// Classified quality level
    pub quality: NetworkQuality,

    /// Measured downstream bandwidth in megabits per second
    pub bandwidth_mbps: f64,

    /// Measured round-trip latency in milliseconds
    pub latency_ms: f64,

    /// When the measurement was taken
    pub measured_at: DateTime<Utc>,
}

impl NetworkProfile {
    /// Classify a raw measurement into a quality level.
    ///
    /// Bandwidth dominates; latency can demote a level but never promote.
    pub fn classify(bandwidth_mbps: f64, latency_ms: f64) -> NetworkQuality {
        let by_bandwidth = if bandwidth_mbps >= 15.0 {
            NetworkQuality::Excellent
        } else if bandwidth_mbps >= 5.0 {
            NetworkQuality::Good
        } else if bandwidth_mbps >= 2.0 {
            NetworkQuality::Fair
        } else {
            NetworkQuality::Poor
        };

        let by_latency = if latency_ms <= 60.0 {
            NetworkQuality::Excellent
        } else if latency_ms <= 150.0 {
            NetworkQuality::Good
        } else if latency_ms <= 300.0 {
            NetworkQuality::Fair
        } else {
            NetworkQuality::Poor
        };

        by_bandwidth.min(by_latency)
    }

    /// Build a profile from a raw measurement.
    pub fn from_measurement(bandwidth_mbps: f64, latency_ms: f64) -> Self {
        Self {
            quality: Self::classify(bandwidth_mbps, latency_ms),
            bandwidth_mbps,
            latency_ms,
            measured_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_levels() {
        assert_eq!(NetworkProfile::classify(50.0, 20.0), NetworkQuality::Excellent);
        assert_eq!(NetworkProfile::classify(8.0, 80.0), NetworkQuality::Good);
        assert_eq!(NetworkProfile::classify(3.0, 200.0), NetworkQuality::Fair);
        assert_eq!(NetworkProfile::classify(0.5, 800.0), NetworkQuality::Poor);
    }

    #[test]
    fn test_latency_demotes_but_never_promotes() {
        // Plenty of bandwidth, terrible latency
        assert_eq!(NetworkProfile::classify(50.0, 500.0), NetworkQuality::Poor);
        // Terrible bandwidth, great latency
        assert_eq!(NetworkProfile::classify(0.5, 10.0), NetworkQuality::Poor);
    }

    #[test]
    fn test_quality_ordering() {
        assert!(NetworkQuality::Poor < NetworkQuality::Fair);
        assert!(NetworkQuality::Fair < NetworkQuality::Good);
        assert!(NetworkQuality::Good < NetworkQuality::Excellent);
    }
}
