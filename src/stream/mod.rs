pub mod client;
pub mod normalize;
pub mod reconnect;
pub mod transport;

use std::fmt;

pub use client::{RunExit, StreamClient, StreamControl, StreamHandle, StreamStatus};
pub use normalize::TickerNormalizer;
pub use reconnect::{ExponentialBackoff, ReconnectPolicy};
pub use transport::{Connection, Inbound, Sleeper, TokioSleeper, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// Reconnect budget spent; only an explicit connect restarts.
    GaveUp,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Reconnecting { attempt, delay_ms } => {
                write!(f, "reconnecting (attempt {attempt}, in {delay_ms}ms)")
            }
            ConnectionState::GaveUp => f.write_str("gave up"),
        }
    }
}
