//! Local mirror of the shared world for Pokelink.
//!
//! # Key types
//!
//! - [`WorldMirror`]: remote players keyed by id, pruned by active-id sets
//! - [`Interpolator`]: smooths discrete position updates into motion
//! - [`ChatLog`]: bounded chat history
//! - [`AuctionBoard`]: last auction listings page and request outcome
//! - [`WorldConfig`] / [`InterpolationConfig`]: tuning
//!
//! Everything here is owned by the main loop; nothing is shared across
//! tasks, so nothing is locked.

mod auction;
mod chat;
mod config;
mod interpolation;
mod mirror;

pub use auction::{AuctionBoard, AuctionOutcome};
pub use chat::{ChatLine, ChatLog};
pub use config::{InterpolationConfig, WorldConfig};
pub use interpolation::{Interpolator, Track};
pub use mirror::{RemotePlayer, WorldMirror, MAX_MISSED_CYCLES};
