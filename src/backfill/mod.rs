//! Historical candle backfill from a day- or year-partitioned source.

pub mod partition;
pub mod synthetic;

use std::future::Future;

use chrono::FixedOffset;
use futures_util::future::join_all;

use crate::clock::Clock;
use crate::error::FeedError;
use crate::model::candle::Candle;
use crate::model::timeframe::Timeframe;

use self::synthetic::SyntheticSeries;

/// One shard of the remote history, addressed by a partition key.
pub trait CandleSource {
    fn fetch_partition(
        &self,
        timeframe: Timeframe,
        key: &str,
    ) -> impl Future<Output = Result<Vec<Candle>, FeedError>>;
}

/// Where the candles in a [`Backfill`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Exchange,
    /// Real candles with `synthetic` generated ones prepended.
    Padded { synthetic: usize },
    Synthetic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Backfill {
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub provenance: Provenance,
}

/// Identifies the backfill a result belongs to, so a stale result from a
/// previous timeframe selection can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillTicket {
    pub timeframe: Timeframe,
    pub generation: u64,
}

pub struct HistoricalFetcher<S, C> {
    source: S,
    clock: C,
    offset: FixedOffset,
}

impl<S: CandleSource, C: Clock> HistoricalFetcher<S, C> {
    pub fn new(source: S, clock: C, offset: FixedOffset) -> Self {
        Self {
            source,
            clock,
            offset,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The most recent `count` candles, ascending by start time.
    ///
    /// Never fails: partitions that error or come back empty are skipped,
    /// a short result is padded with synthetic candles on the older side,
    /// and a wholly empty result is replaced by a synthetic series.
    pub async fn fetch_recent(&self, timeframe: Timeframe, count: usize) -> Backfill {
        if count == 0 {
            return Backfill {
                timeframe,
                candles: Vec::new(),
                provenance: Provenance::Exchange,
            };
        }

        let now = self.clock.now_ms();
        let keys = partition::plan(timeframe, count, now, self.offset);
        tracing::info!(
            timeframe = %timeframe,
            count,
            partitions = ?keys,
            "Fetching historical candles"
        );

        let results = join_all(
            keys.iter()
                .map(|key| self.source.fetch_partition(timeframe, key)),
        )
        .await;

        let mut merged: Vec<Candle> = Vec::new();
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(candles) if candles.is_empty() => {
                    tracing::warn!(partition = %key, "Partition returned no candles");
                }
                Ok(candles) => {
                    tracing::debug!(partition = %key, count = candles.len(), "Partition loaded");
                    merged.extend(candles);
                }
                Err(e) => {
                    tracing::warn!(partition = %key, error = %e, "Partition fetch failed, skipping");
                }
            }
        }

        let mut candles = merge_recent(merged, count);
        if candles.is_empty() {
            let err = FeedError::TotalBackfillFailure {
                partitions: keys.len(),
            };
            tracing::warn!(error = %err, timeframe = %timeframe, "Using synthetic candles");
            return Backfill {
                timeframe,
                candles: SyntheticSeries::new(timeframe).ending_at(now, count),
                provenance: Provenance::Synthetic,
            };
        }

        let missing = count - candles.len();
        if missing == 0 {
            tracing::info!(count = candles.len(), "Historical candles loaded");
            return Backfill {
                timeframe,
                candles,
                provenance: Provenance::Exchange,
            };
        }

        let first = candles[0];
        let mut padded =
            SyntheticSeries::new(timeframe).leading_into(first.start_time, first.open, missing);
        let synthetic = padded.len();
        tracing::info!(
            real = candles.len(),
            synthetic,
            "Historical candles padded with synthetic data"
        );
        padded.append(&mut candles);
        Backfill {
            timeframe,
            candles: padded,
            provenance: Provenance::Padded { synthetic },
        }
    }
}

/// Sort ascending, keep one candle per start time (the later partition wins),
/// and return the newest `count`.
pub fn merge_recent(mut candles: Vec<Candle>, count: usize) -> Vec<Candle> {
    candles.sort_by_key(|c| c.start_time);
    let mut unique: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match unique.last_mut() {
            Some(last) if last.start_time == candle.start_time => *last = candle,
            _ => unique.push(candle),
        }
    }
    let skip = unique.len().saturating_sub(count);
    unique.split_off(skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(start: u64) -> Candle {
        Candle::from_ohlcv(start, 60_000, 1.0, 1.0, 1.0, 1.0, 0.0)
    }

    #[test]
    fn merge_sorts_dedups_and_trims() {
        let mut later = candle(120_000);
        later.close = 9.0;
        let merged = merge_recent(
            vec![candle(180_000), candle(0), candle(120_000), candle(60_000), later],
            3,
        );
        let starts: Vec<u64> = merged.iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![60_000, 120_000, 180_000]);
        assert!((merged[1].close - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn merge_keeps_everything_when_short() {
        assert_eq!(merge_recent(vec![candle(0)], 10).len(), 1);
        assert!(merge_recent(Vec::new(), 10).is_empty());
    }
}
