//! The inventory collaborator.
//!
//! Trading needs exactly four things from the game's creature storage:
//! reserve a creature, release it, hand it over, and receive one. The game
//! implements [`Inventory`] over its own storage; [`PartyInventory`] is an
//! in-memory implementation used by the headless client and tests.
//!
//! # Invariant
//!
//! A creature is either available or locked, never both, and never
//! neither while it is still held. `exchange` keeps this across a trade.

use std::collections::HashSet;

use pokelink_protocol::{CreatureDescriptor, CreatureUid};

use crate::InventoryError;

/// Creature storage as seen by the trade engine.
pub trait Inventory {
    /// Creatures that are held and not locked.
    fn available(&self) -> Vec<CreatureDescriptor>;

    /// Whether the creature is reserved for a trade.
    fn is_locked(&self, uid: &CreatureUid) -> bool;

    /// Reserves a creature. It stays held but is no longer available.
    fn lock(&mut self, uid: &CreatureUid) -> Result<CreatureDescriptor, InventoryError>;

    /// Releases a reserved creature back to availability.
    fn unlock(&mut self, uid: &CreatureUid) -> Result<(), InventoryError>;

    /// Removes a reserved creature from storage and returns it.
    fn take_locked(&mut self, uid: &CreatureUid) -> Result<CreatureDescriptor, InventoryError>;

    /// Stores a new creature.
    fn add(&mut self, creature: CreatureDescriptor) -> Result<(), InventoryError>;

    /// Swaps a locked creature for a received one, all or nothing.
    ///
    /// If the received creature can't be stored, the given one is put back
    /// and re-locked before the error is returned.
    fn exchange(
        &mut self,
        give: &CreatureUid,
        receive: CreatureDescriptor,
    ) -> Result<CreatureDescriptor, InventoryError> {
        let given = self.take_locked(give)?;
        if let Err(e) = self.add(receive) {
            let uid = given.uid.clone();
            self.add(given)?;
            self.lock(&uid)?;
            return Err(e);
        }
        Ok(given)
    }
}

// ---------------------------------------------------------------------------
// PartyInventory
// ---------------------------------------------------------------------------

/// A party of up to `party_limit` creatures with unbounded box overflow.
#[derive(Debug, Clone)]
pub struct PartyInventory {
    party: Vec<CreatureDescriptor>,
    boxed: Vec<CreatureDescriptor>,
    locked: HashSet<CreatureUid>,
    party_limit: usize,
}

impl Default for PartyInventory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PARTY_LIMIT)
    }
}

impl PartyInventory {
    pub const DEFAULT_PARTY_LIMIT: usize = 6;

    pub fn new(party_limit: usize) -> Self {
        Self {
            party: Vec::new(),
            boxed: Vec::new(),
            locked: HashSet::new(),
            party_limit: party_limit.max(1),
        }
    }

    /// Builds an inventory from a list, filling the party first.
    pub fn with_creatures(creatures: impl IntoIterator<Item = CreatureDescriptor>) -> Self {
        let mut inv = Self::default();
        for creature in creatures {
            if let Err(e) = inv.add(creature) {
                tracing::warn!(error = %e, "skipping creature");
            }
        }
        inv
    }

    pub fn party(&self) -> &[CreatureDescriptor] {
        &self.party
    }

    pub fn boxed(&self) -> &[CreatureDescriptor] {
        &self.boxed
    }

    /// Every held creature, locked or not.
    pub fn len(&self) -> usize {
        self.party.len() + self.boxed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, uid: &CreatureUid) -> bool {
        self.find(uid).is_some()
    }

    fn find(&self, uid: &CreatureUid) -> Option<&CreatureDescriptor> {
        self.party.iter().chain(&self.boxed).find(|c| &c.uid == uid)
    }
}

impl Inventory for PartyInventory {
    fn available(&self) -> Vec<CreatureDescriptor> {
        self.party
            .iter()
            .chain(&self.boxed)
            .filter(|c| !self.locked.contains(&c.uid))
            .cloned()
            .collect()
    }

    fn is_locked(&self, uid: &CreatureUid) -> bool {
        self.locked.contains(uid)
    }

    fn lock(&mut self, uid: &CreatureUid) -> Result<CreatureDescriptor, InventoryError> {
        let creature = self
            .find(uid)
            .cloned()
            .ok_or_else(|| InventoryError::UnknownCreature(uid.clone()))?;
        if !self.locked.insert(uid.clone()) {
            return Err(InventoryError::AlreadyLocked(uid.clone()));
        }
        Ok(creature)
    }

    fn unlock(&mut self, uid: &CreatureUid) -> Result<(), InventoryError> {
        if self.locked.remove(uid) {
            Ok(())
        } else {
            Err(InventoryError::NotLocked(uid.clone()))
        }
    }

    fn take_locked(&mut self, uid: &CreatureUid) -> Result<CreatureDescriptor, InventoryError> {
        if !self.locked.contains(uid) {
            return Err(InventoryError::NotLocked(uid.clone()));
        }
        let taken = if let Some(i) = self.party.iter().position(|c| &c.uid == uid) {
            self.party.remove(i)
        } else if let Some(i) = self.boxed.iter().position(|c| &c.uid == uid) {
            self.boxed.remove(i)
        } else {
            return Err(InventoryError::UnknownCreature(uid.clone()));
        };
        self.locked.remove(uid);
        Ok(taken)
    }

    fn add(&mut self, creature: CreatureDescriptor) -> Result<(), InventoryError> {
        if self.contains(&creature.uid) {
            return Err(InventoryError::Duplicate(creature.uid));
        }
        if self.party.len() < self.party_limit {
            self.party.push(creature);
        } else {
            tracing::debug!(uid = %creature.uid, "party full, sending to box");
            self.boxed.push(creature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mon(uid: &str) -> CreatureDescriptor {
        CreatureDescriptor::new(uid, "pidgey", 5)
    }

    #[test]
    fn test_lock_removes_from_available_but_keeps_held() {
        let mut inv = PartyInventory::with_creatures([mon("a"), mon("b")]);
        inv.lock(&"a".into()).unwrap();

        assert_eq!(inv.available().len(), 1);
        assert_eq!(inv.len(), 2);
        assert!(inv.is_locked(&"a".into()));
    }

    #[test]
    fn test_lock_twice_fails() {
        let mut inv = PartyInventory::with_creatures([mon("a")]);
        inv.lock(&"a".into()).unwrap();
        assert_eq!(
            inv.lock(&"a".into()),
            Err(InventoryError::AlreadyLocked("a".into()))
        );
    }

    #[test]
    fn test_take_locked_requires_lock() {
        let mut inv = PartyInventory::with_creatures([mon("a")]);
        assert_eq!(
            inv.take_locked(&"a".into()),
            Err(InventoryError::NotLocked("a".into()))
        );
    }

    #[test]
    fn test_add_overflows_to_box() {
        let mut inv = PartyInventory::new(1);
        inv.add(mon("a")).unwrap();
        inv.add(mon("b")).unwrap();
        assert_eq!(inv.party().len(), 1);
        assert_eq!(inv.boxed().len(), 1);
    }

    #[test]
    fn test_exchange_swaps_locked_for_received() {
        let mut inv = PartyInventory::with_creatures([mon("a")]);
        inv.lock(&"a".into()).unwrap();

        let given = inv.exchange(&"a".into(), mon("z")).unwrap();

        assert_eq!(given.uid, CreatureUid::from("a"));
        assert!(!inv.contains(&"a".into()));
        assert!(inv.contains(&"z".into()));
        assert!(!inv.is_locked(&"a".into()));
    }

    #[test]
    fn test_exchange_duplicate_received_rolls_back() {
        let mut inv = PartyInventory::with_creatures([mon("a"), mon("b")]);
        inv.lock(&"a".into()).unwrap();

        let result = inv.exchange(&"a".into(), mon("b"));

        assert_eq!(result, Err(InventoryError::Duplicate("b".into())));
        assert!(inv.contains(&"a".into()));
        assert!(inv.is_locked(&"a".into()));
        assert_eq!(inv.len(), 2);
    }
}
