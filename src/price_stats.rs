use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Up,
    Down,
    #[default]
    Flat,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Flat => "flat",
        })
    }
}

/// Session high/low and last move, fed from live ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceStats {
    pub last: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub direction: Direction,
    pub ticks: u64,
}

impl PriceStats {
    pub fn record(&mut self, price: f64) {
        self.direction = match self.last {
            Some(prev) if price > prev => Direction::Up,
            Some(prev) if price < prev => Direction::Down,
            _ => Direction::Flat,
        };
        self.high = Some(self.high.map_or(price, |h| h.max(price)));
        self.low = Some(self.low.map_or(price, |l| l.min(price)));
        self.last = Some(price);
        self.ticks += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `high - low`, once at least one price was seen.
    pub fn range(&self) -> Option<f64> {
        Some(self.high? - self.low?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_extremes_and_direction() {
        let mut stats = PriceStats::default();
        assert_eq!(stats.range(), None);

        stats.record(100.0);
        assert_eq!(stats.direction, Direction::Flat);
        stats.record(105.0);
        assert_eq!(stats.direction, Direction::Up);
        stats.record(95.0);
        assert_eq!(stats.direction, Direction::Down);
        stats.record(95.0);
        assert_eq!(stats.direction, Direction::Flat);

        assert_eq!(stats.high, Some(105.0));
        assert_eq!(stats.low, Some(95.0));
        assert_eq!(stats.last, Some(95.0));
        assert_eq!(stats.range(), Some(10.0));
        assert_eq!(stats.ticks, 4);

        stats.reset();
        assert_eq!(stats, PriceStats::default());
    }
}
