//! Deterministic stand-in candles for when the history source has nothing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::candle::Candle;
use crate::model::timeframe::Timeframe;

/// Starting price for a fully synthetic series (JPY per BTC).
pub const SEED_PRICE: f64 = 15_500_000.0;
const SEED: u64 = 0x5eed_b7c_0001;

/// Open-to-open drift per candle, as a fraction.
const MAX_DRIFT: f64 = 0.01;
/// High/low/close distance from the open, as a fraction.
const MAX_INTRABAR: f64 = 0.005;

pub struct SyntheticSeries {
    rng: StdRng,
    timeframe: Timeframe,
}

impl SyntheticSeries {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            rng: StdRng::seed_from_u64(SEED ^ timeframe.width_ms()),
            timeframe,
        }
    }

    /// `count` candles ending with the bucket that contains `now_ms`.
    pub fn ending_at(&mut self, now_ms: u64, count: usize) -> Vec<Candle> {
        let width = self.timeframe.width_ms();
        let last_start = self.timeframe.bucket_start(now_ms);
        // Near the epoch there are fewer buckets than requested.
        let count = count.min((last_start / width) as usize + 1);
        let first_start = last_start - width * count.saturating_sub(1) as u64;

        let mut base = SEED_PRICE;
        let mut out = Vec::with_capacity(count);
        for i in 0..count as u64 {
            let drift = self.rng.gen_range(-MAX_DRIFT..=MAX_DRIFT);
            let open = (base * (1.0 + drift)).round();
            let candle = self.bar(first_start + i * width, open);
            base = candle.close;
            out.push(candle);
        }
        out
    }

    /// `count` candles immediately before `first_start`, walked backwards so
    /// each open stays within half a percent of the following candle's open.
    /// Returned oldest first.
    pub fn leading_into(&mut self, first_start: u64, anchor_open: f64, count: usize) -> Vec<Candle> {
        let width = self.timeframe.width_ms();
        let available = (first_start / width) as usize;
        let count = count.min(available);

        let mut next_open = anchor_open;
        let mut out = Vec::with_capacity(count);
        for i in 1..=count as u64 {
            let open = (next_open * (1.0 + self.rng.gen_range(-MAX_INTRABAR..=MAX_INTRABAR))).round();
            out.push(self.bar(first_start - i * width, open));
            next_open = open;
        }
        out.reverse();
        out
    }

    fn bar(&mut self, start_time: u64, open: f64) -> Candle {
        let high = (open * (1.0 + self.rng.gen_range(0.0..=MAX_INTRABAR))).round();
        let low = (open * (1.0 - self.rng.gen_range(0.0..=MAX_INTRABAR))).round();
        let close = (open * (1.0 + self.rng.gen_range(-MAX_INTRABAR..=MAX_INTRABAR))).round();
        let volume = self.rng.gen_range(10.0..110.0);
        Candle::from_ohlcv(
            start_time,
            self.timeframe.width_ms(),
            open,
            high.max(open).max(close),
            low.min(open).min(close),
            close,
            volume,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_709_380_800_000;

    #[test]
    fn ending_at_is_aligned_and_contiguous() {
        let candles = SyntheticSeries::new(Timeframe::Min5).ending_at(NOW + 12_345, 50);
        assert_eq!(candles.len(), 50);
        assert_eq!(candles.last().unwrap().start_time, Timeframe::Min5.bucket_start(NOW));
        for pair in candles.windows(2) {
            assert_eq!(pair[1].start_time - pair[0].start_time, 300_000);
        }
    }

    #[test]
    fn walk_stays_within_bounds() {
        let candles = SyntheticSeries::new(Timeframe::Hour1).ending_at(NOW, 200);
        for pair in candles.windows(2) {
            let step = (pair[1].open - pair[0].close).abs() / pair[0].close;
            assert!(step <= 0.02, "drift {step}");
        }
        for c in &candles {
            assert!(c.is_consistent());
            assert!(c.high <= (c.open * 1.005).round() + 1.0);
            assert!(c.low >= (c.open * 0.995).round() - 1.0);
        }
    }

    #[test]
    fn series_is_deterministic() {
        let a = SyntheticSeries::new(Timeframe::Min1).ending_at(NOW, 20);
        let b = SyntheticSeries::new(Timeframe::Min1).ending_at(NOW, 20);
        assert_eq!(a, b);
    }

    #[test]
    fn leading_into_stops_before_first_start() {
        let first = Timeframe::Min1.bucket_start(NOW);
        let pad = SyntheticSeries::new(Timeframe::Min1).leading_into(first, 10_000_000.0, 5);
        assert_eq!(pad.len(), 5);
        assert_eq!(pad.last().unwrap().start_time, first - 60_000);
        assert_eq!(pad[0].start_time, first - 5 * 60_000);
        assert!(pad.iter().all(Candle::is_consistent));
    }

    #[test]
    fn leading_into_keeps_intrabar_moves_within_half_percent_of_open() {
        let first = Timeframe::Min5.bucket_start(NOW);
        let anchor = 15_000_000.0;
        let pad = SyntheticSeries::new(Timeframe::Min5).leading_into(first, anchor, 100);
        for c in &pad {
            let bound = (c.open * MAX_INTRABAR).ceil() + 1.0;
            assert!((c.close - c.open).abs() <= bound, "close {} open {}", c.close, c.open);
            assert!(c.high - c.open <= bound);
            assert!(c.open - c.low <= bound);
        }
        let newest = pad.last().unwrap();
        assert!((newest.open - anchor).abs() <= (anchor * MAX_INTRABAR).ceil() + 1.0);
        for pair in pad.windows(2) {
            let step = (pair[1].open - pair[0].open).abs() / pair[0].open;
            assert!(step <= 0.0051, "open step {step}");
        }
    }
}
