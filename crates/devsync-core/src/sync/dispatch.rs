//! Inbound message dispatch
//!
//! Maps each decoded message onto the shared-state operations of a
//! [`SessionStore`]. The current device id is read from the store on every
//! message, never cached.

use tracing::{debug, info, warn};

use super::message::{DataUpdate, InboundMessage};
use crate::store::SessionStore;

/// What a dispatched message resulted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Session list refresh requested
    SessionsRefreshed,
    /// Local logout forced
    LoggedOut,
    /// User fields merged
    UserMerged,
    /// Message had no defined handling
    Ignored,
}

/// Apply one inbound message to the store
pub fn dispatch(store: &dyn SessionStore, message: InboundMessage) -> Dispatched {
    match message {
        InboundMessage::SessionUpdate => {
            debug!("Session list changed remotely");
            store.refresh_sessions();
            Dispatched::SessionsRefreshed
        }
        InboundMessage::DeviceRemoved { device_id } => {
            let current = store.current_device_id();
            if current.as_deref() == Some(device_id.as_str()) {
                info!("This device ({}) was removed remotely, logging out", device_id);
                store.force_logout();
                Dispatched::LoggedOut
            } else {
                debug!("Device {} was removed, refreshing sessions", device_id);
                store.refresh_sessions();
                Dispatched::SessionsRefreshed
            }
        }
        InboundMessage::ForceLogout => {
            info!("Server forced logout");
            store.force_logout();
            Dispatched::LoggedOut
        }
        InboundMessage::DataUpdate(DataUpdate::User(fields)) => {
            debug!("Merging {} user field(s)", fields.len());
            store.merge_user_update(fields);
            Dispatched::UserMerged
        }
        InboundMessage::DataUpdate(DataUpdate::Other { data_type, .. }) => {
            debug!("Ignoring data update of type {}", data_type);
            Dispatched::Ignored
        }
        InboundMessage::Unhandled { kind } => {
            warn!("Ignoring unhandled message type {}", kind);
            Dispatched::Ignored
        }
    }
}
