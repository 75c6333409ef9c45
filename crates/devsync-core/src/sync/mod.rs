//! Real-time device session sync
//!
//! Maintains a WebSocket to the backend's session fanout endpoint and turns
//! inbound control messages into shared-state actions.
//!
//! ## Protocol
//!
//! 1. Connect to `<server_url>/ws?token=<bearer token>`
//! 2. Receive JSON frames `{ "type": ..., "payload": ... }`
//! 3. Dispatch each frame to the [`SessionStore`](crate::store::SessionStore)
//! 4. On close or error, reconnect with exponential backoff
//!
//! Nothing is sent to the server.
//!
//! ## Usage
//!
//! ```ignore
//! let slot = SyncSlot::new(config, credentials, store);
//! let client = slot.get_instance();
//! // ...
//! slot.destroy_instance().await;
//! ```

mod backoff;
mod client;
mod connection;
mod dispatch;
mod message;
mod slot;

pub use backoff::ReconnectPolicy;
pub use client::DeviceSyncClient;
pub use connection::{
    Connection, ConnectionSnapshot, ConnectionState, DisconnectReason, Transition,
};
pub use dispatch::{dispatch, Dispatched};
pub use message::{DataUpdate, InboundMessage};
pub use slot::SyncSlot;
