//! Conversion of raw sensor millivolts into UV index, UV level and risk tier.
//!
//! Calibrated for GUVA-S12D based analog UV sensors. All functions are pure.

use crate::models::{Classification, Reading, RiskTier};

// ---

/// Millivolt breakpoints for UV index 1..=11 (upper edge of each segment).
pub const UV_INDEX_MV_THRESHOLDS: [f64; 12] = [
    50.0, 227.0, 318.0, 408.0, 503.0, 606.0, 696.0, 795.0, 881.0, 976.0, 1079.0, 1170.0,
];

/// Highest UV index the sensor table can report.
pub const UV_INDEX_SATURATION: f64 = 11.0;

/// (inclusive upper bound, tier). The last bound also covers everything above it.
pub const RISK_TIER_TABLE: [(f64, RiskTier); 5] = [
    (2.0, RiskTier::Low),
    (5.0, RiskTier::Moderate),
    (7.0, RiskTier::High),
    (10.0, RiskTier::VeryHigh),
    (11.0, RiskTier::Extreme),
];

/// Map sensor output voltage to a UV index by table interpolation.
///
/// Readings in the last segment or beyond the table saturate at 11.
/// Negative readings are treated as zero.
pub fn compute_uv_index(mv: f64) -> f64 {
    // ---
    let mv = mv.max(0.0);
    match UV_INDEX_MV_THRESHOLDS.iter().position(|&t| mv < t) {
        Some(i) if i < UV_INDEX_MV_THRESHOLDS.len() - 1 => {
            mv / UV_INDEX_MV_THRESHOLDS[i] * (i + 1) as f64
        }
        _ => UV_INDEX_SATURATION,
    }
}

/// UV level in mW/cm^2. Vo = 4.3 * I(uA) and 1 uA corresponds to ~9 mW/cm^2.
pub fn compute_uv_level(mv: f64) -> f64 {
    mv / 43.0 * 9.0
}

/// First tier whose bound is >= `uv_index`, or the top tier past the table.
///
/// Returns the tier together with the bound it matched against.
pub fn classify_risk(uv_index: f64) -> (RiskTier, f64) {
    // ---
    let (bound, tier) = RISK_TIER_TABLE
        .iter()
        .copied()
        .find(|&(bound, _)| uv_index <= bound)
        .unwrap_or(RISK_TIER_TABLE[RISK_TIER_TABLE.len() - 1]);
    (tier, bound)
}

/// Run the full classification for one reading.
pub fn classify(reading: Reading) -> Classification {
    // ---
    let uv_index = compute_uv_index(reading.millivolts);
    let (risk_tier, threshold_upper_bound) = classify_risk(uv_index);

    Classification {
        uv_index,
        uv_level: compute_uv_level(reading.millivolts.max(0.0)),
        risk_tier,
        threshold_upper_bound,
        display_color: risk_tier.color(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_index_at_first_breakpoint() {
        // ---
        // 50 mV sits on the first breakpoint and starts segment two: 50/227*2
        assert!(approx(compute_uv_index(50.0), 50.0 / 227.0 * 2.0));
        assert!(approx(compute_uv_index(49.0), 49.0 / 50.0));
        assert!(compute_uv_index(1.0) > 0.0 && compute_uv_index(1.0) <= 1.0);
    }

    #[test]
    fn test_index_saturates() {
        // ---
        assert_eq!(compute_uv_index(1170.0), 11.0);
        assert_eq!(compute_uv_index(1169.0), 11.0);
        assert_eq!(compute_uv_index(1079.0), 11.0);
        assert_eq!(compute_uv_index(5000.0), 11.0);
        assert_eq!(compute_uv_index(f64::MAX), 11.0);
    }

    #[test]
    fn test_index_monotonic_within_segments() {
        // ---
        let mut lower = 0.0;
        for &upper in UV_INDEX_MV_THRESHOLDS.iter() {
            let mut previous = compute_uv_index(lower);
            let mut mv = lower;
            while mv < upper {
                let value = compute_uv_index(mv);
                assert!(value >= previous, "index decreased at {} mV", mv);
                previous = value;
                mv += 0.5;
            }
            lower = upper;
        }
    }

    #[test]
    fn test_index_near_internal_breakpoints() {
        // ---
        // Just below breakpoint i the value approaches i+1 and never exceeds it.
        for (i, &t) in UV_INDEX_MV_THRESHOLDS.iter().enumerate().take(11) {
            let below = compute_uv_index(t - 1e-6);
            assert!(below <= (i + 1) as f64 + 1e-9, "segment {} overshoots", i);
            assert!(below > (i + 1) as f64 - 1e-3, "segment {} falls short", i);
        }
    }

    #[test]
    fn test_negative_reading_is_zero() {
        // ---
        assert_eq!(compute_uv_index(-12.0), 0.0);
    }

    #[test]
    fn test_uv_level_calibration_point() {
        // ---
        assert!(approx(compute_uv_level(43.0), 9.0));
        assert_eq!(compute_uv_level(0.0), 0.0);
    }

    #[test]
    fn test_risk_boundaries() {
        // ---
        assert_eq!(classify_risk(0.0).0, RiskTier::Low);
        assert_eq!(classify_risk(2.0).0, RiskTier::Low);
        assert_eq!(classify_risk(2.01).0, RiskTier::Moderate);
        assert_eq!(classify_risk(7.0).0, RiskTier::High);
        assert_eq!(classify_risk(9.99).0, RiskTier::VeryHigh);
        assert_eq!(classify_risk(11.0), (RiskTier::Extreme, 11.0));
    }

    #[test]
    fn test_risk_fallback_above_table() {
        // ---
        assert_eq!(classify_risk(15.0), (RiskTier::Extreme, 11.0));
        assert_eq!(RiskTier::Extreme.color(), "violet");
    }

    #[test]
    fn test_risk_name_and_color() {
        // ---
        let (tier, _) = classify_risk(2.0);
        assert_eq!((tier.name(), tier.color()), ("low", "green"));
        let (tier, _) = classify_risk(2.01);
        assert_eq!((tier.name(), tier.color()), ("moderate", "yellow"));
    }

    #[test]
    fn test_classify_combines_everything() {
        // ---
        let c = classify(Reading { millivolts: 650.0 });
        assert!(approx(c.uv_index, 650.0 / 696.0 * 7.0));
        assert_eq!(c.risk_tier, RiskTier::High);
        assert_eq!(c.display_color, "orange");
        assert_eq!(c.threshold_upper_bound, 7.0);
        assert!(approx(c.uv_level, 650.0 / 43.0 * 9.0));
    }
}
