use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// Chart bucket width. Each variant maps to a fixed width in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    Min1,
    #[default]
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Hour8,
    Hour12,
    Day1,
    Week1,
    Month1,
}

/// How the history source shards candles for a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionScheme {
    /// One request per calendar day, key `YYYYMMDD`.
    Daily,
    /// One request per calendar year, key `YYYY`.
    Yearly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 11] = [
        Timeframe::Min1,
        Timeframe::Min5,
        Timeframe::Min15,
        Timeframe::Min30,
        Timeframe::Hour1,
        Timeframe::Hour4,
        Timeframe::Hour8,
        Timeframe::Hour12,
        Timeframe::Day1,
        Timeframe::Week1,
        Timeframe::Month1,
    ];

    pub fn width_ms(self) -> u64 {
        match self {
            Timeframe::Min1 => MINUTE_MS,
            Timeframe::Min5 => 5 * MINUTE_MS,
            Timeframe::Min15 => 15 * MINUTE_MS,
            Timeframe::Min30 => 30 * MINUTE_MS,
            Timeframe::Hour1 => HOUR_MS,
            Timeframe::Hour4 => 4 * HOUR_MS,
            Timeframe::Hour8 => 8 * HOUR_MS,
            Timeframe::Hour12 => 12 * HOUR_MS,
            Timeframe::Day1 => DAY_MS,
            Timeframe::Week1 => 7 * DAY_MS,
            // Calendar months vary; buckets use a fixed 30-day width.
            Timeframe::Month1 => 30 * DAY_MS,
        }
    }

    /// Short label used in config and commands (`5m`, `1h`, `1mo`).
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Min5 => "5m",
            Timeframe::Min15 => "15m",
            Timeframe::Min30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Hour8 => "8h",
            Timeframe::Hour12 => "12h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
            Timeframe::Month1 => "1mo",
        }
    }

    /// Candle type name in the bitbank REST path.
    pub fn wire_name(self) -> &'static str {
        match self {
            Timeframe::Min1 => "1min",
            Timeframe::Min5 => "5min",
            Timeframe::Min15 => "15min",
            Timeframe::Min30 => "30min",
            Timeframe::Hour1 => "1hour",
            Timeframe::Hour4 => "4hour",
            Timeframe::Hour8 => "8hour",
            Timeframe::Hour12 => "12hour",
            Timeframe::Day1 => "1day",
            Timeframe::Week1 => "1week",
            Timeframe::Month1 => "1month",
        }
    }

    /// 4h and longer are served per year; shorter frames per day.
    pub fn partition_scheme(self) -> PartitionScheme {
        if self.width_ms() >= 4 * HOUR_MS {
            PartitionScheme::Yearly
        } else {
            PartitionScheme::Daily
        }
    }

    pub fn is_long_horizon(self) -> bool {
        self.partition_scheme() == PartitionScheme::Yearly
    }

    /// Number of buckets in one calendar day (at least 1).
    pub fn candles_per_day(self) -> u64 {
        (DAY_MS / self.width_ms()).max(1)
    }

    /// Start of the bucket containing `timestamp_ms`.
    pub fn bucket_start(self, timestamp_ms: u64) -> u64 {
        let width = self.width_ms();
        (timestamp_ms / width) * width
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = FeedError;

    /// Accepts both the short label and the REST wire name, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.label() == needle || tf.wire_name() == needle)
            .ok_or_else(|| FeedError::InvalidTimeframe(s.to_string()))
    }
}

impl<'de> serde::Deserialize<'de> for Timeframe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_labels() {
        assert_eq!(Timeframe::Min5.width_ms(), 300_000);
        assert_eq!(Timeframe::Hour4.width_ms(), 14_400_000);
        assert_eq!(Timeframe::Week1.width_ms(), 604_800_000);
        assert_eq!(Timeframe::Month1.width_ms(), 2_592_000_000);
    }

    #[test]
    fn long_horizon_starts_at_four_hours() {
        assert!(!Timeframe::Hour1.is_long_horizon());
        assert!(Timeframe::Hour4.is_long_horizon());
        assert!(Timeframe::Month1.is_long_horizon());
        assert_eq!(Timeframe::Min30.partition_scheme(), PartitionScheme::Daily);
    }

    #[test]
    fn parses_label_and_wire_name() {
        assert_eq!("5m".parse::<Timeframe>().unwrap(), Timeframe::Min5);
        assert_eq!("5MIN".parse::<Timeframe>().unwrap(), Timeframe::Min5);
        assert_eq!("1hour".parse::<Timeframe>().unwrap(), Timeframe::Hour1);
        assert_eq!(" 1mo ".parse::<Timeframe>().unwrap(), Timeframe::Month1);
        assert!("2m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn bucket_start_aligns_down() {
        let tf = Timeframe::Min5;
        assert_eq!(tf.bucket_start(0), 0);
        assert_eq!(tf.bucket_start(299_999), 0);
        assert_eq!(tf.bucket_start(300_000), 300_000);
        assert_eq!(tf.bucket_start(1_700_000_123_456) % 300_000, 0);
    }
}
