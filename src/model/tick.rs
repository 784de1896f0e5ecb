/// A single price observation from the ticker stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub price: f64,
    pub sell: Option<f64>,
    pub buy: Option<f64>,
    /// Cumulative volume as reported by the feed, when present.
    pub volume: Option<f64>,
    pub timestamp_ms: u64,
}

impl Tick {
    /// Tick carrying only a last price.
    pub fn from_price(price: f64, timestamp_ms: u64) -> Self {
        Self {
            price,
            sell: None,
            buy: None,
            volume: None,
            timestamp_ms,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Midpoint of the book when both sides are known.
    pub fn mid(&self) -> Option<f64> {
        match (self.sell, self.buy) {
            (Some(sell), Some(buy)) => Some((sell + buy) / 2.0),
            _ => None,
        }
    }
}
