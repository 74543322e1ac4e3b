//! Connection management for the Pokelink client.
//!
//! This crate owns everything that touches the socket:
//!
//! 1. **Connect + authenticate**: bounded in time, no side effects on
//!    failure ([`ConnectionManager::try_connect`])
//! 2. **Background tasks**: one receive loop, one writer, one heartbeat
//! 3. **Hand-off**: parsed messages land in a FIFO the main loop drains
//!    with [`ConnectionManager::try_next`]
//! 4. **Teardown**: [`ConnectionManager::disconnect`] from any state
//!
//! # How it fits in the stack
//!
//! ```text
//! Router / Client (above)  ← drains the queue every frame
//!     ↕
//! Session Layer (this crate)  ← socket lifecycle, session record
//!     ↕
//! Protocol + Transport (below)  ← line codec, TCP
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::{ConnectionManager, Inbound};
pub use session::{ConnectionConfig, ConnectionState, Credentials, LastError, Session};
