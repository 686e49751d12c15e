//! Read pump connection lifecycle

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

/// Lifecycle of a registered WebSocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Registered and receiving notifications
    Open,
    /// The client went away; deregistration pending
    Closing,
    /// Removed from the registry
    Closed,
}

/// What the read pump observed on the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A text or binary frame; clients do not send data, so it is discarded
    Data,
    /// Ping or pong
    Control,
    /// A close frame
    Close,
    /// A transport or protocol error
    Error,
    /// The stream ended without a close frame
    Ended,
}

impl FrameOutcome {
    pub fn from_frame(frame: &Result<Message, axum::Error>) -> Self {
        match frame {
            Ok(Message::Text(_) | Message::Binary(_)) => Self::Data,
            Ok(Message::Ping(_) | Message::Pong(_)) => Self::Control,
            Ok(Message::Close(_)) => Self::Close,
            Err(_) => Self::Error,
        }
    }
}

impl ConnectionState {
    /// Next state after the read pump observes `outcome`
    #[must_use]
    pub fn on_frame(self, outcome: FrameOutcome) -> Self {
        match (self, outcome) {
            (Self::Open, FrameOutcome::Data | FrameOutcome::Control) => Self::Open,
            (Self::Open, FrameOutcome::Close | FrameOutcome::Error | FrameOutcome::Ended) => {
                Self::Closing
            }
            (state, _) => state,
        }
    }

    /// State once the connection has been removed from the registry
    #[must_use]
    pub fn deregistered(self) -> Self {
        match self {
            Self::Closing | Self::Closed => Self::Closed,
            Self::Open => Self::Open,
        }
    }

    #[inline]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}
