use std::collections::VecDeque;

use crate::aggregator::AggregationEvent;
use crate::model::candle::Candle;

pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded window of completed candles plus the in-progress one.
#[derive(Debug, Clone)]
pub struct CandleStore {
    capacity: usize,
    window: VecDeque<Candle>,
    in_progress: Option<Candle>,
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity + 1),
            in_progress: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the window wholesale and clear the in-progress slot.
    /// Only the newest `capacity` candles are kept.
    pub fn load_historical(&mut self, candles: &[Candle]) {
        let skip = candles.len().saturating_sub(self.capacity);
        self.window = candles[skip..].iter().copied().collect();
        self.in_progress = None;
        tracing::debug!(
            loaded = self.window.len(),
            dropped = skip,
            "Candle window replaced"
        );
    }

    /// Overwrite the in-progress slot.
    pub fn apply_update(&mut self, candle: Candle) {
        if let Some(last) = self.window.back() {
            if candle.start_time < last.start_time {
                tracing::debug!(
                    start = candle.start_time,
                    last = last.start_time,
                    "Ignoring update older than the window"
                );
                return;
            }
        }
        self.in_progress = Some(candle);
    }

    /// Append a finalized candle and evict the oldest when over capacity.
    ///
    /// A candle for the same bucket as the newest window entry replaces it.
    pub fn apply_complete(&mut self, candle: Candle) {
        match self.window.back_mut() {
            Some(last) if candle.start_time == last.start_time => {
                *last = candle;
                return;
            }
            Some(last) if candle.start_time < last.start_time => {
                tracing::debug!(
                    start = candle.start_time,
                    last = last.start_time,
                    "Ignoring completed candle older than the window"
                );
                return;
            }
            _ => {}
        }
        self.window.push_back(candle);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn apply(&mut self, event: AggregationEvent) {
        match event {
            AggregationEvent::Update(candle) => self.apply_update(candle),
            AggregationEvent::Complete(candle) => self.apply_complete(candle),
        }
    }

    pub fn completed(&self) -> impl Iterator<Item = &Candle> {
        self.window.iter()
    }

    pub fn completed_len(&self) -> usize {
        self.window.len()
    }

    pub fn in_progress(&self) -> Option<&Candle> {
        self.in_progress.as_ref()
    }

    /// Window followed by the in-progress candle, oldest first.
    pub fn snapshot(&self) -> Vec<Candle> {
        let mut out: Vec<Candle> = self.window.iter().copied().collect();
        if let Some(current) = self.in_progress {
            match out.last_mut() {
                Some(last) if last.start_time == current.start_time => *last = current,
                _ => out.push(current),
            }
        }
        out
    }
}
