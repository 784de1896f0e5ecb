use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::error::FeedError;

/// One decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Event payload, handed to the ticker normalizer.
    Message(Value),
    /// A frame the transport could not decode.
    Unrecognized,
}

/// Opens live connections to the ticker source.
pub trait Transport {
    type Conn: Connection;

    fn connect(&mut self) -> impl Future<Output = Result<Self::Conn, FeedError>>;
}

pub trait Connection {
    /// Ask the server to start pushing `channel`.
    fn subscribe(&mut self, channel: &str) -> impl Future<Output = Result<(), FeedError>>;

    /// Next message; `None` once the server has closed the connection.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Inbound, FeedError>>>;

    fn close(&mut self) -> impl Future<Output = ()>;
}

/// Waits between reconnect attempts.
pub trait Sleeper {
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
