//! parkgate-hub - Real-time broadcast hub
//!
//! The hub owns every live display connection, grouped by room key
//! (`gate_in_1`, `entrance:ZONE07:2`, ...). All mutations go through one
//! event loop reached by message passing, so register, unregister and
//! broadcast are totally ordered and no caller ever touches the maps.

pub mod hub;
pub mod subscriber;

pub use hub::{ConnectionId, Hub, HubConfig, HubError, HubHandle};
pub use subscriber::{Subscriber, SubscriberError};
