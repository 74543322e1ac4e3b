//! Dead-reckoning for remote players.
//!
//! The server reports positions in discrete steps. Every frame the
//! interpolator moves each entity's rendered sub-tile position toward its
//! latest reported target:
//!
//! ```text
//!   first update / warp ──→ snap (rendered = target)
//!   small step          ──→ move toward target at a tiered speed
//!                           (far: fast, near: slow, never past target)
//! ```
//!
//! A frame longer than `max_frame_ms` (e.g. after a window drag) is skipped
//! entirely rather than replayed as one big jump.

use std::collections::HashMap;
use std::time::Duration;

use pokelink_protocol::{MapId, PlayerId, Position, SUBUNITS_PER_TILE};

use crate::InterpolationConfig;

/// Squared distance at or above which the far speed applies (1.5 tiles).
const FAR_DISTANCE_SQ: f32 = (1.5 * SUBUNITS_PER_TILE as f32) * (1.5 * SUBUNITS_PER_TILE as f32);

/// Squared distance at or above which the mid speed applies (0.5 tile).
const MID_DISTANCE_SQ: f32 = (0.5 * SUBUNITS_PER_TILE as f32) * (0.5 * SUBUNITS_PER_TILE as f32);

/// Smoothing state of one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Track {
    pub map_id: MapId,
    /// Latest reported tile.
    pub tile_x: i32,
    pub tile_y: i32,
    /// Latest reported sub-tile position.
    pub target_x: i32,
    pub target_y: i32,
    /// Where the entity is drawn this frame, in sub-tile units.
    pub rendered_x: f32,
    pub rendered_y: f32,
}

impl Track {
    fn snapped(pos: &Position) -> Self {
        Self {
            map_id: pos.map_id,
            tile_x: pos.x,
            tile_y: pos.y,
            target_x: pos.real_x,
            target_y: pos.real_y,
            rendered_x: pos.real_x as f32,
            rendered_y: pos.real_y as f32,
        }
    }

    /// Whether the rendered position has reached the target.
    pub fn settled(&self) -> bool {
        self.rendered_x == self.target_x as f32 && self.rendered_y == self.target_y as f32
    }
}

/// Per-entity position smoother.
#[derive(Debug, Clone)]
pub struct Interpolator {
    config: InterpolationConfig,
    tracks: HashMap<PlayerId, Track>,
}

impl Interpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config: config.validated(),
            tracks: HashMap::new(),
        }
    }

    /// Feeds a new reported position. Returns `true` if the entity snapped.
    pub fn set_target(&mut self, id: PlayerId, pos: &Position) -> bool {
        let snap_distance = self.config.snap_tile_distance.unsigned_abs();
        match self.tracks.get_mut(&id) {
            Some(track)
                if track.map_id == pos.map_id
                    && pos.x.abs_diff(track.tile_x) <= snap_distance
                    && pos.y.abs_diff(track.tile_y) <= snap_distance =>
            {
                track.tile_x = pos.x;
                track.tile_y = pos.y;
                track.target_x = pos.real_x;
                track.target_y = pos.real_y;
                false
            }
            _ => {
                self.tracks.insert(id, Track::snapped(pos));
                true
            }
        }
    }

    /// Advances every entity by one frame of `elapsed` time.
    ///
    /// A zero-length frame or one longer than `max_frame_ms` is a no-op.
    pub fn advance(&mut self, elapsed: Duration) {
        if elapsed.is_zero() || elapsed > self.config.max_frame() {
            if !elapsed.is_zero() {
                tracing::trace!(elapsed_ms = elapsed.as_millis() as u64, "skipping stalled frame");
            }
            return;
        }
        let dt = elapsed.as_secs_f32();
        for track in self.tracks.values_mut() {
            step(&self.config, track, dt);
        }
    }

    /// Rendered sub-tile position of an entity.
    pub fn rendered(&self, id: PlayerId) -> Option<(f32, f32)> {
        self.tracks.get(&id).map(|t| (t.rendered_x, t.rendered_y))
    }

    pub fn track(&self, id: PlayerId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn remove(&mut self, id: PlayerId) {
        self.tracks.remove(&id);
    }

    /// Drops tracks whose entity no longer exists.
    pub fn retain(&mut self, mut keep: impl FnMut(PlayerId) -> bool) {
        self.tracks.retain(|id, _| keep(*id));
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

fn speed_for(config: &InterpolationConfig, distance_sq: f32) -> f32 {
    if distance_sq >= FAR_DISTANCE_SQ {
        config.far_speed
    } else if distance_sq >= MID_DISTANCE_SQ {
        config.mid_speed
    } else {
        config.near_speed
    }
}

fn step(config: &InterpolationConfig, track: &mut Track, dt: f32) {
    let dx = track.target_x as f32 - track.rendered_x;
    let dy = track.target_y as f32 - track.rendered_y;
    let distance_sq = dx * dx + dy * dy;
    if distance_sq == 0.0 {
        return;
    }
    let distance = distance_sq.sqrt();
    let movement = (speed_for(config, distance_sq) * dt).max(config.min_step);
    if movement >= distance {
        track.rendered_x = track.target_x as f32;
        track.rendered_y = track.target_y as f32;
    } else {
        track.rendered_x += dx / distance * movement;
        track.rendered_y += dy / distance * movement;
    }
}
