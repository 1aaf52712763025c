//! Compression planning: requested tier or size budget → raster quality.
//!
//! One plan is computed per request and applied to every rasterised page.
//! Native PDF pages are never re-encoded, so the plan only steers the size of
//! synthesised pages.

use crate::error::Docs2PdfError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Lowest and highest quality a plan may carry.
pub const MIN_QUALITY: u8 = 10;
pub const MAX_QUALITY: u8 = 100;

/// Ratio → quality buckets for the custom tier, checked top to bottom with
/// `ratio > threshold`. Ratios at or below the last threshold get
/// [`CUSTOM_FLOOR_QUALITY`].
pub const CUSTOM_QUALITY_TABLE: [(f64, u8); 4] = [(0.9, 95), (0.7, 85), (0.5, 70), (0.3, 55)];
pub const CUSTOM_FLOOR_QUALITY: u8 = 40;

/// Named compression preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionTier {
    Low,
    #[default]
    Medium,
    High,
    Custom,
}

impl CompressionTier {
    /// Fixed `(quality, ratio)` for the named presets; `None` for custom.
    pub fn preset(self) -> Option<(u8, f64)> {
        match self {
            CompressionTier::Low => Some((95, 0.9)),
            CompressionTier::Medium => Some((80, 0.7)),
            CompressionTier::High => Some((60, 0.5)),
            CompressionTier::Custom => None,
        }
    }
}

impl fmt::Display for CompressionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompressionTier::Low => "low",
            CompressionTier::Medium => "medium",
            CompressionTier::High => "high",
            CompressionTier::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl FromStr for CompressionTier {
    type Err = Docs2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionTier::Low),
            "medium" => Ok(CompressionTier::Medium),
            "high" => Ok(CompressionTier::High),
            "custom" => Ok(CompressionTier::Custom),
            other => Err(Docs2PdfError::InvalidCompression(format!(
                "unknown compression tier '{other}' (expected low, medium, high or custom)"
            ))),
        }
    }
}

/// Quality decision applied uniformly to one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionPlan {
    /// JPEG quality in `[10, 100]`.
    pub quality_percent: u8,
    /// Requested output/input size ratio in `(0, 1]`.
    pub target_ratio: f64,
}

/// Compute the plan for a request.
///
/// For [`CompressionTier::Custom`], an explicit target size takes precedence
/// over an explicit ratio. The custom tier with neither, a zero target size,
/// or a ratio outside `(0, 1]` is rejected.
pub fn plan(
    tier: CompressionTier,
    target_size_bytes: Option<u64>,
    ratio: Option<f64>,
    aggregate_input_bytes: u64,
) -> Result<CompressionPlan, Docs2PdfError> {
    if let Some((quality, target_ratio)) = tier.preset() {
        debug!("Compression tier {} → quality {}", tier, quality);
        return Ok(CompressionPlan {
            quality_percent: clamp_quality(quality),
            target_ratio,
        });
    }

    let target_ratio = match (target_size_bytes, ratio) {
        (Some(0), _) => {
            return Err(Docs2PdfError::InvalidCompression(
                "target size must be greater than zero".into(),
            ))
        }
        (Some(target), _) if aggregate_input_bytes == 0 => {
            debug!("Empty input with target {} bytes; using ratio 1", target);
            1.0
        }
        (Some(target), _) => (target as f64 / aggregate_input_bytes as f64).min(1.0),
        (None, Some(r)) if r > 0.0 && r <= 1.0 => r,
        (None, Some(r)) => {
            return Err(Docs2PdfError::InvalidCompression(format!(
                "compression ratio must be in (0, 1], got {r}"
            )))
        }
        (None, None) => {
            return Err(Docs2PdfError::InvalidCompression(
                "custom compression needs a target size or a ratio".into(),
            ))
        }
    };

    let quality = clamp_quality(quality_for_ratio(target_ratio));
    debug!(
        "Custom compression: ratio {:.3} → quality {}",
        target_ratio, quality
    );
    Ok(CompressionPlan {
        quality_percent: quality,
        target_ratio,
    })
}

/// Bucket a ratio into a quality value.
pub fn quality_for_ratio(ratio: f64) -> u8 {
    CUSTOM_QUALITY_TABLE
        .iter()
        .find(|(threshold, _)| ratio > *threshold)
        .map(|(_, quality)| *quality)
        .unwrap_or(CUSTOM_FLOOR_QUALITY)
}

fn clamp_quality(q: u8) -> u8 {
    q.clamp(MIN_QUALITY, MAX_QUALITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_tiers() {
        let q = |t| plan(t, None, None, 1000).unwrap().quality_percent;
        assert_eq!(q(CompressionTier::Low), 95);
        assert_eq!(q(CompressionTier::Medium), 80);
        assert_eq!(q(CompressionTier::High), 60);
    }

    #[test]
    fn tiers_are_monotonic() {
        let q = |t| plan(t, None, None, 1000).unwrap().quality_percent;
        assert!(q(CompressionTier::Low) >= q(CompressionTier::Medium));
        assert!(q(CompressionTier::Medium) >= q(CompressionTier::High));
    }

    #[test]
    fn presets_ignore_explicit_values() {
        let p = plan(CompressionTier::High, Some(1), Some(0.99), 1000).unwrap();
        assert_eq!(p.quality_percent, 60);
        assert_eq!(p.target_ratio, 0.5);
    }

    #[test]
    fn custom_target_size_bucket() {
        let p = plan(CompressionTier::Custom, Some(100 * 1024), None, 1000 * 1024).unwrap();
        assert!((p.target_ratio - 0.1).abs() < 1e-9);
        assert_eq!(p.quality_percent, 40);
    }

    #[test]
    fn custom_target_larger_than_input_caps_ratio() {
        let p = plan(CompressionTier::Custom, Some(5000), None, 1000).unwrap();
        assert_eq!(p.target_ratio, 1.0);
        assert_eq!(p.quality_percent, 95);
    }

    #[test]
    fn custom_target_wins_over_ratio() {
        let p = plan(CompressionTier::Custom, Some(600), Some(0.1), 1000).unwrap();
        assert_eq!(p.quality_percent, 70);
    }

    #[test]
    fn custom_ratio_buckets() {
        let q = |r| plan(CompressionTier::Custom, None, Some(r), 1000).unwrap().quality_percent;
        assert_eq!(q(1.0), 95);
        assert_eq!(q(0.9), 85);
        assert_eq!(q(0.8), 85);
        assert_eq!(q(0.7), 70);
        assert_eq!(q(0.6), 70);
        assert_eq!(q(0.4), 55);
        assert_eq!(q(0.3), 40);
        assert_eq!(q(0.01), 40);
    }

    #[test]
    fn quality_always_in_range() {
        for i in 1..=100 {
            let r = i as f64 / 100.0;
            let p = plan(CompressionTier::Custom, None, Some(r), 0).unwrap();
            assert!((MIN_QUALITY..=MAX_QUALITY).contains(&p.quality_percent));
        }
    }

    #[test]
    fn custom_without_target_is_rejected() {
        assert!(plan(CompressionTier::Custom, None, None, 1000).is_err());
        assert!(plan(CompressionTier::Custom, Some(0), None, 1000).is_err());
        assert!(plan(CompressionTier::Custom, None, Some(0.0), 1000).is_err());
        assert!(plan(CompressionTier::Custom, None, Some(1.5), 1000).is_err());
    }

    #[test]
    fn tier_parsing() {
        assert_eq!("LOW".parse::<CompressionTier>().unwrap(), CompressionTier::Low);
        assert_eq!("custom".parse::<CompressionTier>().unwrap(), CompressionTier::Custom);
        assert!("extreme".parse::<CompressionTier>().is_err());
        assert_eq!(CompressionTier::High.to_string(), "high");
    }

    #[test]
    fn tier_serde_is_lowercase() {
        let json = serde_json::to_string(&CompressionTier::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let tier: CompressionTier = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(tier, CompressionTier::Custom);
    }
}
