//! World and interpolation configuration.

use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// InterpolationConfig
// ---------------------------------------------------------------------------

/// Tuning for remote-player smoothing.
///
/// Speeds are in sub-tile units per second. The three tiers are picked by
/// the remaining distance to the target: far (≥ 1.5 tiles), mid
/// (≥ 0.5 tile) and near.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// A tile jump larger than this on either axis is a warp and snaps.
    ///
    /// Default: 2.
    pub snap_tile_distance: i32,

    /// Frames longer than this are treated as stalls and skipped.
    ///
    /// Default: 250.
    pub max_frame_ms: u64,

    /// Default: 1024.
    pub far_speed: f32,

    /// Default: 512.
    pub mid_speed: f32,

    /// Default: 256.
    pub near_speed: f32,

    /// Smallest movement applied in a non-skipped frame, so motion never
    /// stalls short of the target.
    ///
    /// Default: 1.0.
    pub min_step: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            snap_tile_distance: 2,
            max_frame_ms: 250,
            far_speed: 1024.0,
            mid_speed: 512.0,
            near_speed: 256.0,
            min_step: 1.0,
        }
    }
}

impl InterpolationConfig {
    /// Clamps out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.snap_tile_distance < 0 {
            tracing::warn!(value = self.snap_tile_distance, "negative snap distance, using 0");
            self.snap_tile_distance = 0;
        }
        if self.max_frame_ms == 0 {
            self.max_frame_ms = defaults.max_frame_ms;
        }
        if !(self.min_step.is_finite() && self.min_step > 0.0) {
            self.min_step = defaults.min_step;
        }
        for (speed, fallback) in [
            (&mut self.far_speed, defaults.far_speed),
            (&mut self.mid_speed, defaults.mid_speed),
            (&mut self.near_speed, defaults.near_speed),
        ] {
            if !(speed.is_finite() && *speed > 0.0) {
                tracing::warn!(value = *speed, "invalid interpolation speed, using default");
                *speed = fallback;
            }
        }
        self
    }

    pub fn max_frame(&self) -> Duration {
        Duration::from_millis(self.max_frame_ms)
    }
}

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// Configuration for the world mirror and its companions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Lines kept in the chat log.
    ///
    /// Default: 50.
    pub chat_capacity: usize,

    pub interpolation: InterpolationConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chat_capacity: 50,
            interpolation: InterpolationConfig::default(),
        }
    }
}

impl WorldConfig {
    pub fn validated(mut self) -> Self {
        if self.chat_capacity == 0 {
            tracing::warn!("chat_capacity is 0, using 1");
            self.chat_capacity = 1;
        }
        self.interpolation = self.interpolation.validated();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_config_default() {
        let cfg = InterpolationConfig::default();
        assert_eq!(cfg.snap_tile_distance, 2);
        assert_eq!(cfg.max_frame(), Duration::from_millis(250));
        assert!(cfg.far_speed > cfg.mid_speed && cfg.mid_speed > cfg.near_speed);
    }

    #[test]
    fn test_validated_replaces_bad_speeds() {
        let cfg = InterpolationConfig {
            far_speed: -1.0,
            near_speed: f32::NAN,
            min_step: 0.0,
            max_frame_ms: 0,
            ..InterpolationConfig::default()
        }
        .validated();
        assert_eq!(cfg.far_speed, 1024.0);
        assert_eq!(cfg.near_speed, 256.0);
        assert_eq!(cfg.min_step, 1.0);
        assert_eq!(cfg.max_frame_ms, 250);
    }

    #[test]
    fn test_world_config_deserializes_nested_partial_json() {
        let cfg: WorldConfig =
            serde_json::from_str(r#"{ "interpolation": { "far_speed": 2048.0 } }"#).unwrap();
        assert_eq!(cfg.chat_capacity, 50);
        assert_eq!(cfg.interpolation.far_speed, 2048.0);
        assert_eq!(cfg.interpolation.near_speed, 256.0);
    }

    #[test]
    fn test_world_config_validated_clamps_chat_capacity() {
        let cfg = WorldConfig {
            chat_capacity: 0,
            ..WorldConfig::default()
        }
        .validated();
        assert_eq!(cfg.chat_capacity, 1);
    }
}
