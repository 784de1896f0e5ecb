use crate::model::tick::Tick;
use crate::model::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub start_time: u64,
    pub end_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub tick_count: u32,
}

impl Candle {
    /// Candle read from a history source; `tick_count` stays 0.
    pub fn from_ohlcv(
        start_time: u64,
        width_ms: u64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            start_time,
            end_time: start_time.saturating_add(width_ms),
            open,
            high,
            low,
            close,
            volume,
            tick_count: 0,
        }
    }

    /// `low <= open, close <= high`.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

/// Aggregates live ticks into a single candle over one time bucket.
#[derive(Debug, Clone)]
pub struct CandleBuilder {
    candle: Candle,
}

impl CandleBuilder {
    /// Start a new candle. The bucket is aligned to the timeframe.
    pub fn new(tick: &Tick, timeframe: Timeframe) -> Self {
        let start_time = timeframe.bucket_start(tick.timestamp_ms);
        Self {
            candle: Candle {
                start_time,
                end_time: start_time.saturating_add(timeframe.width_ms()),
                open: tick.price,
                high: tick.price,
                low: tick.price,
                close: tick.price,
                volume: tick.volume.unwrap_or(0.0),
                tick_count: 1,
            },
        }
    }

    /// Fold a tick from the same bucket into the candle.
    ///
    /// The feed reports cumulative volume, so a present value replaces the
    /// previous one instead of adding to it.
    pub fn update(&mut self, tick: &Tick) {
        let c = &mut self.candle;
        c.high = c.high.max(tick.price);
        c.low = c.low.min(tick.price);
        c.close = tick.price;
        if let Some(volume) = tick.volume {
            c.volume = volume;
        }
        c.tick_count = c.tick_count.saturating_add(1);
    }

    /// Count a tick without letting it move the prices.
    pub fn count_only(&mut self) {
        self.candle.tick_count = self.candle.tick_count.saturating_add(1);
    }

    pub fn start_time(&self) -> u64 {
        self.candle.start_time
    }

    /// Current state of the candle, by value.
    pub fn snapshot(&self) -> Candle {
        self.candle
    }

    /// Finalize into an immutable Candle.
    pub fn finish(self) -> Candle {
        self.candle
    }
}
