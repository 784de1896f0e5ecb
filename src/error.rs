use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("unknown timeframe '{0}'")]
    InvalidTimeframe(String),

    #[error("partition {key} fetch failed: {reason}")]
    PartitionFetch { key: String, reason: String },

    #[error("no candles available from any of {partitions} partitions")]
    TotalBackfillFailure { partitions: usize },

    #[error("malformed stream message: {0}")]
    MalformedStreamMessage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed: {0}")]
    Disconnect(String),

    #[error("gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
