//! WebSocket connection registry and notification fan-out
//!
//! Backend services publish notifications to a queue. The gateway consumes
//! them and writes each one, unchanged, to the WebSocket connections of the
//! users listed in its `userIDs` field (or to everyone when the list is
//! missing or empty).

mod registry;
mod state;

pub use registry::{
    ConnectionId, DispatchReport, Notifier, NotifierError, MESSAGE_BUFFER_SIZE,
};
pub use state::{ConnectionState, FrameOutcome};
