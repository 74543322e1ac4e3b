//! The client's mirror of other players in the world.
//!
//! The server is authoritative; this map only ever reflects what it last
//! said. Records are:
//!
//! - **created** by a roster snapshot (`player_list`) or a join notice
//! - **updated** by every position or follower broadcast
//! - **removed** by a leave notice, or after missing from a map's active-id
//!   set for more than one cycle
//!
//! A record's `map_id` is always the last one received, so filtering by map
//! never shows a player somewhere it didn't report.

use std::collections::HashMap;

use pokelink_protocol::{
    FollowerDescriptor, MapId, PlayerId, PlayerMovement, PlayerSnapshot, Position,
};

/// Active-id cycles a record may miss before it is pruned.
pub const MAX_MISSED_CYCLES: u8 = 1;

/// Everything the client knows about one remote player.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub id: PlayerId,
    pub username: String,
    pub position: Position,
    pub charset: String,
    pub follower: Option<FollowerDescriptor>,
    /// Consecutive active-id sets for this player's map that omitted it.
    pub missed_cycles: u8,
}

impl RemotePlayer {
    pub fn map_id(&self) -> MapId {
        self.position.map_id
    }
}

impl From<PlayerSnapshot> for RemotePlayer {
    fn from(snapshot: PlayerSnapshot) -> Self {
        Self {
            id: snapshot.id,
            username: snapshot.username,
            position: snapshot.position,
            charset: snapshot.charset,
            follower: snapshot.follower,
            missed_cycles: 0,
        }
    }
}

/// Map of remote players keyed by server id.
#[derive(Debug, Default)]
pub struct WorldMirror {
    players: HashMap<PlayerId, RemotePlayer>,
    local_id: Option<PlayerId>,
    local_map: Option<MapId>,
}

impl WorldMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets our own id so server echoes of ourselves are ignored.
    pub fn set_local_id(&mut self, id: Option<PlayerId>) {
        self.local_id = id;
        if let Some(id) = id {
            self.players.remove(&id);
        }
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    /// Records which map the local player is on.
    pub fn set_local_map(&mut self, map_id: MapId) {
        if self.local_map != Some(map_id) {
            tracing::debug!(%map_id, "local map changed");
        }
        self.local_map = Some(map_id);
    }

    pub fn local_map(&self) -> Option<MapId> {
        self.local_map
    }

    /// Replaces the whole roster with a server snapshot.
    ///
    /// Returns the ids that were dropped because the snapshot omitted them.
    pub fn replace_roster(&mut self, players: Vec<PlayerSnapshot>) -> Vec<PlayerId> {
        let mut next: HashMap<PlayerId, RemotePlayer> = players
            .into_iter()
            .filter(|p| Some(p.id) != self.local_id)
            .map(|p| (p.id, RemotePlayer::from(p)))
            .collect();
        let dropped = self
            .players
            .keys()
            .filter(|id| !next.contains_key(*id))
            .copied()
            .collect();
        std::mem::swap(&mut self.players, &mut next);
        tracing::debug!(count = self.players.len(), "roster replaced");
        dropped
    }

    /// Adds or refreshes a player from a join notice.
    ///
    /// Returns `false` if the snapshot is ourselves.
    pub fn upsert(&mut self, snapshot: PlayerSnapshot) -> bool {
        if Some(snapshot.id) == self.local_id {
            return false;
        }
        tracing::debug!(player_id = %snapshot.id, username = %snapshot.username, "player joined");
        self.players.insert(snapshot.id, RemotePlayer::from(snapshot));
        true
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<RemotePlayer> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            tracing::debug!(player_id = %id, "player left");
        }
        removed
    }

    /// Applies a position broadcast. Unknown players are ignored: records
    /// are only created from a roster or join notice.
    pub fn apply_movement(&mut self, movement: &PlayerMovement) -> Option<&RemotePlayer> {
        let Some(player) = self.players.get_mut(&movement.id) else {
            tracing::trace!(player_id = %movement.id, "movement for unknown player");
            return None;
        };
        player.position = movement.position;
        player.missed_cycles = 0;
        Some(&*player)
    }

    /// Sets or clears a player's follower. Returns `false` for unknown ids.
    pub fn set_follower(&mut self, id: PlayerId, follower: Option<FollowerDescriptor>) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.follower = follower;
                true
            }
            None => false,
        }
    }

    /// Applies the server's active-id set for one map.
    ///
    /// Every record on `map_id` that the set omits gets a missed cycle; once
    /// a record has missed more than [`MAX_MISSED_CYCLES`] it is removed.
    /// Records that appear in the set are reset. Returns the removed ids.
    pub fn apply_active_set(&mut self, map_id: MapId, ids: &[PlayerId]) -> Vec<PlayerId> {
        let mut pruned = Vec::new();
        for player in self.players.values_mut().filter(|p| p.map_id() == map_id) {
            if ids.contains(&player.id) {
                player.missed_cycles = 0;
            } else {
                player.missed_cycles = player.missed_cycles.saturating_add(1);
                if player.missed_cycles > MAX_MISSED_CYCLES {
                    pruned.push(player.id);
                }
            }
        }
        for id in &pruned {
            self.players.remove(id);
            tracing::debug!(player_id = %id, %map_id, "pruned stale player");
        }
        pruned
    }

    pub fn get(&self, id: PlayerId) -> Option<&RemotePlayer> {
        self.players.get(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    /// Players currently reporting `map_id`.
    pub fn visible_on(&self, map_id: MapId) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values().filter(move |p| p.map_id() == map_id)
    }

    /// Players on the local map. Empty until the local map is known.
    pub fn visible(&self) -> Vec<&RemotePlayer> {
        match self.local_map {
            Some(map_id) => self.visible_on(map_id).collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Forgets everything, including the local id and map.
    pub fn clear(&mut self) {
        self.players.clear();
        self.local_id = None;
        self.local_map = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: u64, map: u32) -> PlayerSnapshot {
        PlayerSnapshot {
            id: PlayerId(id),
            username: format!("trainer{id}"),
            position: Position::on_tile(MapId(map), 1, 1),
            charset: "trainer_red".into(),
            follower: None,
        }
    }

    #[test]
    fn test_replace_roster_skips_local_player_and_reports_dropped() {
        let mut world = WorldMirror::new();
        world.set_local_id(Some(PlayerId(1)));
        world.upsert(snapshot(5, 1));

        let dropped = world.replace_roster(vec![snapshot(1, 1), snapshot(2, 1)]);

        assert_eq!(dropped, vec![PlayerId(5)]);
        assert!(!world.contains(PlayerId(1)));
        assert!(world.contains(PlayerId(2)));
    }

    #[test]
    fn test_apply_movement_updates_map_id() {
        let mut world = WorldMirror::new();
        world.upsert(snapshot(2, 1));
        let moved = PlayerMovement {
            id: PlayerId(2),
            position: Position::on_tile(MapId(7), 4, 4),
        };
        world.apply_movement(&moved).expect("known player");

        assert_eq!(world.get(PlayerId(2)).unwrap().map_id(), MapId(7));
        assert_eq!(world.visible_on(MapId(1)).count(), 0);
        assert_eq!(world.visible_on(MapId(7)).count(), 1);
    }

    #[test]
    fn test_apply_movement_unknown_player_is_ignored() {
        let mut world = WorldMirror::new();
        let moved = PlayerMovement {
            id: PlayerId(3),
            position: Position::on_tile(MapId(1), 0, 0),
        };
        assert!(world.apply_movement(&moved).is_none());
        assert!(world.is_empty());
    }

    #[test]
    fn test_apply_active_set_prunes_after_two_misses() {
        let mut world = WorldMirror::new();
        world.upsert(snapshot(2, 1));
        world.upsert(snapshot(3, 1));
        world.upsert(snapshot(4, 9));

        assert!(world.apply_active_set(MapId(1), &[PlayerId(3)]).is_empty());
        assert!(world.contains(PlayerId(2)));

        let pruned = world.apply_active_set(MapId(1), &[PlayerId(3)]);
        assert_eq!(pruned, vec![PlayerId(2)]);
        assert!(world.contains(PlayerId(3)));
        // Other maps are untouched.
        assert!(world.contains(PlayerId(4)));
    }

    #[test]
    fn test_apply_active_set_reappearance_resets_misses() {
        let mut world = WorldMirror::new();
        world.upsert(snapshot(2, 1));
        world.apply_active_set(MapId(1), &[]);
        world.apply_active_set(MapId(1), &[PlayerId(2)]);
        world.apply_active_set(MapId(1), &[]);
        assert!(world.contains(PlayerId(2)));
    }

    #[test]
    fn test_visible_requires_local_map() {
        let mut world = WorldMirror::new();
        world.upsert(snapshot(2, 1));
        assert!(world.visible().is_empty());
        world.set_local_map(MapId(1));
        assert_eq!(world.visible().len(), 1);
    }

    #[test]
    fn test_set_follower_unknown_player_returns_false() {
        let mut world = WorldMirror::new();
        assert!(!world.set_follower(PlayerId(2), None));
    }
}
