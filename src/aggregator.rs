//! Tick-to-candle aggregation.
//!
//! The aggregator owns only the in-progress candle. Completed candles are
//! handed out by value and never touched again.

use std::cmp::Ordering;

use crate::model::candle::{Candle, CandleBuilder};
use crate::model::tick::Tick;
use crate::model::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregationEvent {
    /// The in-progress candle changed.
    Update(Candle),
    /// A bucket rolled over; the candle is final.
    Complete(Candle),
}

/// Result of one `ingest` call.
///
/// `completed` is set only on rollover and is always delivered before
/// `updated`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ingested {
    pub completed: Option<Candle>,
    pub updated: Candle,
}

impl Ingested {
    /// Events in delivery order.
    pub fn events(&self) -> impl Iterator<Item = AggregationEvent> {
        self.completed
            .map(AggregationEvent::Complete)
            .into_iter()
            .chain(std::iter::once(AggregationEvent::Update(self.updated)))
    }
}

#[derive(Debug, Clone)]
pub struct TickAggregator {
    timeframe: Timeframe,
    current: Option<CandleBuilder>,
    late_ticks: u64,
}

impl TickAggregator {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            current: None,
            late_ticks: 0,
        }
    }

    /// Switch timeframe and drop the in-progress candle.
    pub fn configure(&mut self, timeframe: Timeframe) {
        tracing::debug!(from = %self.timeframe, to = %timeframe, "Aggregator reconfigured");
        self.timeframe = timeframe;
        self.current = None;
        self.late_ticks = 0;
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn in_progress(&self) -> Option<Candle> {
        self.current.as_ref().map(CandleBuilder::snapshot)
    }

    /// Ticks that arrived for a bucket older than the in-progress one.
    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }

    /// Fold one tick into the in-progress candle.
    ///
    /// A tick dated before the in-progress bucket is counted but leaves the
    /// prices alone; completed candles are never reopened.
    pub fn ingest(&mut self, tick: &Tick) -> Ingested {
        let bucket_start = self.timeframe.bucket_start(tick.timestamp_ms);

        let placement = self
            .current
            .as_ref()
            .map(|builder| bucket_start.cmp(&builder.start_time()));

        match (placement, self.current.as_mut()) {
            (Some(Ordering::Equal), Some(builder)) => {
                builder.update(tick);
                Ingested {
                    completed: None,
                    updated: builder.snapshot(),
                }
            }
            (Some(Ordering::Less), Some(builder)) => {
                self.late_ticks += 1;
                tracing::debug!(
                    tick_ts = tick.timestamp_ms,
                    bucket = builder.start_time(),
                    "Late tick counted without price effect"
                );
                builder.count_only();
                Ingested {
                    completed: None,
                    updated: builder.snapshot(),
                }
            }
            _ => {
                let completed = self.current.take().map(CandleBuilder::finish);
                if let Some(done) = &completed {
                    tracing::debug!(
                        timeframe = %self.timeframe,
                        start = done.start_time,
                        close = done.close,
                        ticks = done.tick_count,
                        "Candle completed"
                    );
                }
                let builder = CandleBuilder::new(tick, self.timeframe);
                let updated = builder.snapshot();
                self.current = Some(builder);
                Ingested { completed, updated }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(ts: u64, price: f64) -> Tick {
        Tick::from_price(price, ts)
    }

    #[test]
    fn first_tick_opens_candle_with_single_update() {
        let mut agg = TickAggregator::new(Timeframe::Min5);
        let out = agg.ingest(&tick(123_456, 100.0));
        assert!(out.completed.is_none());
        assert_eq!(out.updated.start_time, 0);
        assert_eq!(out.updated.end_time, 300_000);
        assert_eq!(out.updated.tick_count, 1);
        assert!((out.updated.volume - 0.0).abs() < f64::EPSILON);
        assert_eq!(out.events().count(), 1);
    }

    #[test]
    fn rollover_emits_complete_before_update() {
        let mut agg = TickAggregator::new(Timeframe::Min5);
        agg.ingest(&tick(0, 100.0));
        agg.ingest(&tick(60_000, 110.0));
        let out = agg.ingest(&tick(300_000, 90.0));

        let events: Vec<_> = out.events().collect();
        assert_eq!(events.len(), 2);
        match events[0] {
            AggregationEvent::Complete(c) => {
                assert_eq!(c.start_time, 0);
                assert!((c.open - 100.0).abs() < f64::EPSILON);
                assert!((c.high - 110.0).abs() < f64::EPSILON);
                assert!((c.low - 100.0).abs() < f64::EPSILON);
                assert!((c.close - 110.0).abs() < f64::EPSILON);
                assert_eq!(c.tick_count, 2);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
        match events[1] {
            AggregationEvent::Update(c) => {
                assert_eq!(c.start_time, 300_000);
                assert!((c.open - 90.0).abs() < f64::EPSILON);
                assert!((c.high - 90.0).abs() < f64::EPSILON);
                assert!((c.low - 90.0).abs() < f64::EPSILON);
                assert!((c.close - 90.0).abs() < f64::EPSILON);
            }
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn late_tick_is_counted_but_ignored() {
        let mut agg = TickAggregator::new(Timeframe::Min1);
        agg.ingest(&tick(120_000, 50.0));
        let out = agg.ingest(&tick(59_000, 999.0));
        assert!(out.completed.is_none());
        assert_eq!(out.updated.start_time, 120_000);
        assert!((out.updated.high - 50.0).abs() < f64::EPSILON);
        assert!((out.updated.close - 50.0).abs() < f64::EPSILON);
        assert_eq!(out.updated.tick_count, 2);
        assert_eq!(agg.late_ticks(), 1);
    }

    #[test]
    fn configure_discards_in_progress_candle() {
        let mut agg = TickAggregator::new(Timeframe::Min1);
        agg.ingest(&tick(0, 1.0));
        agg.configure(Timeframe::Hour1);
        assert!(agg.in_progress().is_none());
        let out = agg.ingest(&tick(3_700_000, 2.0));
        assert!(out.completed.is_none());
        assert_eq!(out.updated.start_time, 3_600_000);
    }
}
