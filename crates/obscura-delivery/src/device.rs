//! Device performance tier detection.

use std::sync::OnceLock;

use sysinfo::System;
use tracing::info;

use obscura_models::DeviceTier;

static DEVICE_TIER: OnceLock<DeviceTier> = OnceLock::new();

/// Resolve the device tier from total memory.
///
/// Detected once and treated as immutable for the process lifetime.
pub fn device_tier() -> DeviceTier {
    *DEVICE_TIER.get_or_init(|| {
        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        let tier = DeviceTier::from_total_memory(total);
        info!(
            total_memory_bytes = total,
            tier = tier.as_str(),
            "Resolved device performance tier"
        );
        tier
    })
}

/// Current used/total memory ratio, sampled fresh on each call.
pub fn memory_pressure_ratio() -> f64 {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return 0.0;
    }
    sys.used_memory() as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_tier_is_stable() {
        assert_eq!(device_tier(), device_tier());
    }

    #[test]
    fn test_memory_pressure_in_unit_range() {
        let ratio = memory_pressure_ratio();
        assert!((0.0..=1.0).contains(&ratio));
    }
}
