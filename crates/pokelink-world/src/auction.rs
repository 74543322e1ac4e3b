//! Client-side view of the auction house.
//!
//! Holds the last page of listings the server sent and the outcome of the
//! last list/buy/cancel request. Nothing here is authoritative.

use pokelink_protocol::{AuctionAction, AuctionListing};

/// Result of one auction request, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionOutcome {
    pub action: AuctionAction,
    pub success: bool,
    pub listing_id: Option<u64>,
    pub message: String,
}

#[derive(Debug, Default, Clone)]
pub struct AuctionBoard {
    page: u32,
    listings: Vec<AuctionListing>,
    last_outcome: Option<AuctionOutcome>,
}

impl AuctionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current page.
    pub fn apply_listings(&mut self, page: u32, listings: Vec<AuctionListing>) {
        self.page = page;
        self.listings = listings;
    }

    /// Records an outcome. A successful buy or cancel also removes the
    /// listing from the current page.
    pub fn apply_outcome(&mut self, outcome: AuctionOutcome) {
        if outcome.success && matches!(outcome.action, AuctionAction::Buy | AuctionAction::Cancel) {
            if let Some(id) = outcome.listing_id {
                self.listings.retain(|l| l.listing_id != id);
            }
        }
        self.last_outcome = Some(outcome);
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn listings(&self) -> &[AuctionListing] {
        &self.listings
    }

    pub fn listing(&self, listing_id: u64) -> Option<&AuctionListing> {
        self.listings.iter().find(|l| l.listing_id == listing_id)
    }

    pub fn last_outcome(&self) -> Option<&AuctionOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use pokelink_protocol::CreatureDescriptor;

    use super::*;

    fn listing(id: u64) -> AuctionListing {
        AuctionListing {
            listing_id: id,
            seller: "Misty".into(),
            creature: CreatureDescriptor::new(format!("uid-{id}"), "staryu", 20),
            price: 500,
        }
    }

    #[test]
    fn test_apply_outcome_successful_buy_removes_listing() {
        let mut board = AuctionBoard::new();
        board.apply_listings(0, vec![listing(1), listing(2)]);
        board.apply_outcome(AuctionOutcome {
            action: AuctionAction::Buy,
            success: true,
            listing_id: Some(1),
            message: String::new(),
        });
        assert!(board.listing(1).is_none());
        assert!(board.listing(2).is_some());
    }

    #[test]
    fn test_apply_outcome_failed_buy_keeps_listing() {
        let mut board = AuctionBoard::new();
        board.apply_listings(3, vec![listing(1)]);
        board.apply_outcome(AuctionOutcome {
            action: AuctionAction::Buy,
            success: false,
            listing_id: Some(1),
            message: "not enough money".into(),
        });
        assert!(board.listing(1).is_some());
        assert_eq!(board.page(), 3);
        assert!(!board.last_outcome().unwrap().success);
    }
}
