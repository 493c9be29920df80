//! Engine configuration.

use crate::error::{TakeoffError, TakeoffResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default snapping tolerance in screen pixels.
pub const DEFAULT_SNAP_TOLERANCE_PX: f64 = 10.0;
/// Default hit-test tolerance in screen pixels.
pub const DEFAULT_HIT_TOLERANCE_PX: f64 = 8.0;
/// Default number of nearby edges considered for intersection snapping.
pub const DEFAULT_INTERSECTION_EDGE_BUDGET: usize = 12;
/// Default undo/redo capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Tunables for a takeoff session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub snap_tolerance_px: f64,
    pub hit_tolerance_px: f64,
    pub intersection_edge_budget: usize,
    pub history_capacity: usize,
    /// Quiet period before items, calibrations and viewer state are written back.
    pub write_back_debounce_ms: u64,
    /// Quiet period before the page is rasterized at a new scale.
    pub rescale_debounce_ms: u64,
    /// Pointer travel that turns an Area press into a rectangle drag.
    pub area_drag_threshold_px: f64,
    /// Endpoint quantization step (document pixels) for line merging.
    pub merge_quantization: f64,
    /// Merge connected segments when a segment is selected.
    pub merge_on_select: bool,
    pub ortho_default: bool,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub double_click_ms: u64,
    pub double_click_distance_px: f64,
    /// Distance moved per arrow-key nudge, in screen pixels.
    pub nudge_px: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_px: DEFAULT_SNAP_TOLERANCE_PX,
            hit_tolerance_px: DEFAULT_HIT_TOLERANCE_PX,
            intersection_edge_budget: DEFAULT_INTERSECTION_EDGE_BUDGET,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            write_back_debounce_ms: 500,
            rescale_debounce_ms: 150,
            area_drag_threshold_px: 6.0,
            merge_quantization: 0.5,
            merge_on_select: true,
            ortho_default: true,
            min_zoom: 0.1,
            max_zoom: 8.0,
            double_click_ms: 500,
            double_click_distance_px: 5.0,
            nudge_px: 1.0,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> TakeoffResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TakeoffError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> TakeoffResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TakeoffError::InvalidConfig(e.to_string()))
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> TakeoffResult<()> {
        fn positive(name: &str, value: f64) -> TakeoffResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TakeoffError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }

        positive("snap_tolerance_px", self.snap_tolerance_px)?;
        positive("hit_tolerance_px", self.hit_tolerance_px)?;
        positive("area_drag_threshold_px", self.area_drag_threshold_px)?;
        positive("merge_quantization", self.merge_quantization)?;
        positive("min_zoom", self.min_zoom)?;
        positive("max_zoom", self.max_zoom)?;
        positive("double_click_distance_px", self.double_click_distance_px)?;
        positive("nudge_px", self.nudge_px)?;

        if self.min_zoom > self.max_zoom {
            return Err(TakeoffError::InvalidConfig(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.history_capacity == 0 {
            return Err(TakeoffError::InvalidConfig(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.intersection_edge_budget < 2 {
            return Err(TakeoffError::InvalidConfig(
                "intersection_edge_budget must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn write_back_delay(&self) -> Duration {
        Duration::from_millis(self.write_back_debounce_ms)
    }

    pub fn rescale_delay(&self) -> Duration {
        Duration::from_millis(self.rescale_debounce_ms)
    }

    pub fn double_click_window(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.write_back_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "snap_tolerance_px": 14.0 }"#).unwrap();
        assert!((config.snap_tolerance_px - 14.0).abs() < f64::EPSILON);
        assert!((config.hit_tolerance_px - DEFAULT_HIT_TOLERANCE_PX).abs() < f64::EPSILON);
        assert!(config.ortho_default);
    }

    #[test]
    fn test_rejects_inverted_zoom_bounds() {
        let result = EngineConfig::from_json(r#"{ "min_zoom": 4.0, "max_zoom": 2.0 }"#);
        assert!(matches!(result, Err(TakeoffError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_tolerance() {
        let config = EngineConfig {
            snap_tolerance_px: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(EngineConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig {
            merge_on_select: false,
            ..Default::default()
        };
        let parsed = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, parsed);
    }
}
