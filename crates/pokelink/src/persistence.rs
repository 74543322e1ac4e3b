//! The persistence collaborator.
//!
//! The client pushes a full account snapshot to the server when it
//! disconnects, and hands over the server's copy when it connects. Reading
//! and writing save files is the host game's business.

use pokelink_protocol::AccountSnapshot;

/// Account snapshot source and sink.
pub trait Persistence {
    /// The current account state, sent in `save_state` on disconnect.
    /// `None` skips the save.
    fn snapshot(&self) -> Option<AccountSnapshot>;

    /// Called with the server's saved account after login.
    fn restore(&mut self, snapshot: AccountSnapshot);
}

/// Keeps the last snapshot in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryPersistence {
    pub current: Option<AccountSnapshot>,
    /// How many times `restore` was called.
    pub restores: usize,
}

impl MemoryPersistence {
    pub fn new(current: Option<AccountSnapshot>) -> Self {
        Self {
            current,
            restores: 0,
        }
    }
}

impl Persistence for MemoryPersistence {
    fn snapshot(&self) -> Option<AccountSnapshot> {
        self.current.clone()
    }

    fn restore(&mut self, snapshot: AccountSnapshot) {
        self.current = Some(snapshot);
        self.restores += 1;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_restore_replaces_snapshot() {
        let mut store = MemoryPersistence::new(Some(AccountSnapshot(json!({ "money": 1 }))));
        store.restore(AccountSnapshot(json!({ "money": 500 })));
        assert_eq!(store.snapshot(), Some(AccountSnapshot(json!({ "money": 500 }))));
        assert_eq!(store.restores, 1);
    }
}
