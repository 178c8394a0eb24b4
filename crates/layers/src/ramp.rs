//! Continuous color mode: log-compressed green → yellow → red → magenta ramp.
//!
//! Value-per-area is extremely right-skewed, so values are compared in
//! `log10(v + 1)` space before interpolation. The gradient breakpoints sit at
//! `t = 0.65` and `t = 0.985`: most of the color range goes to the common
//! values and the top band is reserved for outliers.

use serde::{Deserialize, Serialize};

use crate::symbology::{Rgba, UNSELECTED_ALPHA};

/// End of the green → yellow segment.
pub const WARM_BREAK: f64 = 0.65;
/// End of the yellow → red segment; above it the ramp turns magenta.
pub const HOT_BREAK: f64 = 0.985;

/// Height per unit of value-per-area when extruded.
pub const ELEVATION_SCALE: f64 = 0.00055;

/// Fixed value domain of a continuous attribute.
///
/// This is configuration, not a statistic: it is not recomputed per load or
/// per frame, which keeps re-coloring O(1) per feature.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDomain {
    pub min: f64,
    pub max: f64,
}

impl ValueDomain {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Position of `value` in the domain after log compression, clamped to
    /// `[0, 1]`. A degenerate domain or a non-finite result maps to 0.
    pub fn log_position(&self, value: f64) -> f64 {
        let log_min = (self.min + 1.0).log10();
        let log_max = (self.max + 1.0).log10();
        let span = log_max - log_min;
        if span.is_nan() || span <= 0.0 {
            return 0.0;
        }
        let t = ((value + 1.0).log10() - log_min) / span;
        if t.is_nan() {
            return 0.0;
        }
        t.clamp(0.0, 1.0)
    }
}

impl Default for ValueDomain {
    /// Observed extremes of value per acre in the county dataset.
    fn default() -> Self {
        Self::new(0.0, 18_270_386.920_980_927)
    }
}

/// Color of `value` within `domain`.
pub fn ramp_color(value: f64, domain: &ValueDomain) -> Rgba {
    let [r, g, b] = gradient(domain.log_position(value));
    [r, g, b, UNSELECTED_ALPHA]
}

/// Three-segment gradient over `t` in `[0, 1]`.
pub fn gradient(t: f64) -> [u8; 3] {
    if t < WARM_BREAK {
        [channel(t / WARM_BREAK), 255, 0]
    } else if t < HOT_BREAK {
        [255, channel(1.0 - (t - WARM_BREAK) / (HOT_BREAK - WARM_BREAK)), 0]
    } else {
        [255, 0, channel((t - HOT_BREAK) / (1.0 - HOT_BREAK))]
    }
}

/// Extrusion height for a raw (not log-compressed) value.
pub fn elevation(value: f64) -> f64 {
    value * ELEVATION_SCALE
}

fn channel(fraction: f64) -> u8 {
    (255.0 * fraction).floor().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_ends_map_to_ramp_ends() {
        let d = ValueDomain::default();
        assert_eq!(ramp_color(d.min, &d), [0, 255, 0, 200]);
        assert_eq!(ramp_color(d.max, &d), [255, 0, 255, 200]);
    }

    #[test]
    fn out_of_domain_values_clamp() {
        let d = ValueDomain::new(10.0, 1000.0);
        assert_eq!(ramp_color(0.0, &d), ramp_color(10.0, &d));
        assert_eq!(ramp_color(1e12, &d), ramp_color(1000.0, &d));
    }

    #[test]
    fn is_deterministic() {
        let d = ValueDomain::default();
        for v in [0.0, 1.0, 523.25, 88_000.0, 4_000_000.0] {
            assert_eq!(ramp_color(v, &d), ramp_color(v, &d));
        }
    }

    #[test]
    fn segments_follow_breakpoints() {
        assert_eq!(gradient(0.0), [0, 255, 0]);
        assert_eq!(gradient(0.325), [127, 255, 0]);
        assert_eq!(gradient(WARM_BREAK), [255, 255, 0]);
        let [r, g, b] = gradient(0.8);
        assert_eq!((r, b), (255, 0));
        assert!(g > 0 && g < 255);
        assert_eq!(gradient(HOT_BREAK), [255, 0, 0]);
        assert_eq!(gradient(1.0), [255, 0, 255]);
    }

    #[test]
    fn heat_never_decreases_with_value() {
        let d = ValueDomain::default();
        // Heat rank: red rises, then green falls, then blue rises.
        let heat = |c: Rgba| i32::from(c[0]) + (255 - i32::from(c[1])) + i32::from(c[2]);
        let mut last = heat(ramp_color(0.0, &d));
        let mut v = 1.0;
        while v < d.max {
            let h = heat(ramp_color(v, &d));
            assert!(h >= last, "heat dropped at {v}");
            last = h;
            v *= 1.7;
        }
    }

    #[test]
    fn log_compression_spreads_the_common_range() {
        let d = ValueDomain::default();
        // A linear map would put 10k at t ≈ 0.0005; in log space it is near the middle.
        let t = d.log_position(10_000.0);
        assert!(t > 0.5 && t < 0.6, "t = {t}");
    }

    #[test]
    fn degenerate_domain_and_bad_values_map_to_start() {
        let flat = ValueDomain::new(5.0, 5.0);
        assert_eq!(flat.log_position(100.0), 0.0);
        let d = ValueDomain::default();
        assert_eq!(d.log_position(f64::NAN), 0.0);
        assert_eq!(d.log_position(-5.0), 0.0);
    }

    #[test]
    fn elevation_uses_raw_value() {
        assert!((elevation(1_000_000.0) - 550.0).abs() < 1e-9);
        assert_eq!(elevation(0.0), 0.0);
    }
}
