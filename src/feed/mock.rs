//! Offline ticker source: a bounded random walk served through the same
//! [`Transport`] seam as the live stream.

use std::cell::Cell;
use std::ops::RangeInclusive;
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::clock::{Clock, SystemClock};
use crate::error::FeedError;
use crate::stream::{Connection, Inbound, Transport};

pub const START_PRICE: f64 = 896_489.0;
pub const PRICE_FLOOR: f64 = 800_000.0;
pub const PRICE_CEILING: f64 = 1_000_000.0;
/// Largest per-tick move, as a fraction of price.
pub const MAX_STEP: f64 = 0.001;
/// Largest spread between last price and either book side.
pub const MAX_SPREAD: f64 = 10.0;

const DEFAULT_INTERVAL_MS: RangeInclusive<u64> = 2_000..=5_000;

pub struct MockTransport {
    rng: StdRng,
    price: Rc<Cell<f64>>,
    interval_ms: RangeInclusive<u64>,
    clock: Rc<dyn Clock>,
}

impl MockTransport {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            price: Rc::new(Cell::new(START_PRICE)),
            interval_ms: DEFAULT_INTERVAL_MS,
            clock: Rc::new(SystemClock),
        }
    }

    /// Bounds for the per-connection tick interval.
    pub fn with_interval(mut self, interval_ms: RangeInclusive<u64>) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn price(&self) -> f64 {
        self.price.get()
    }
}

impl Transport for MockTransport {
    type Conn = MockConnection;

    async fn connect(&mut self) -> Result<MockConnection, FeedError> {
        let interval = self.rng.gen_range(self.interval_ms.clone());
        tracing::info!(interval_ms = interval, "Mock feed connected");
        Ok(MockConnection {
            rng: StdRng::seed_from_u64(self.rng.gen()),
            price: self.price.clone(),
            interval: Duration::from_millis(interval),
            clock: self.clock.clone(),
            joined: None,
        })
    }
}

pub struct MockConnection {
    rng: StdRng,
    price: Rc<Cell<f64>>,
    interval: Duration,
    clock: Rc<dyn Clock>,
    joined: Option<String>,
}

impl MockConnection {
    fn next_ticker(&mut self) -> Value {
        let step = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
        let price = (self.price.get() * (1.0 + step))
            .round()
            .clamp(PRICE_FLOOR, PRICE_CEILING);
        self.price.set(price);
        let sell = price + self.rng.gen_range(0.0..=MAX_SPREAD).round();
        let buy = price - self.rng.gen_range(0.0..=MAX_SPREAD).round();
        json!({
            "sell": format!("{sell:.0}"),
            "buy": format!("{buy:.0}"),
            "last": format!("{price:.0}"),
            "timestamp": self.clock.now_ms(),
        })
    }
}

impl Connection for MockConnection {
    async fn subscribe(&mut self, channel: &str) -> Result<(), FeedError> {
        self.joined = Some(channel.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Inbound, FeedError>> {
        if self.joined.is_none() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.interval).await;
        Some(Ok(Inbound::Message(self.next_ticker())))
    }

    async fn close(&mut self) {
        self.joined = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::stream::TickerNormalizer;

    #[tokio::test]
    async fn emits_bounded_ticks_the_normalizer_accepts() {
        let clock = Rc::new(ManualClock::new(1_000));
        let mut transport = MockTransport::new(7)
            .with_interval(0..=0)
            .with_clock(clock.clone());
        let mut conn = transport.connect().await.unwrap();
        conn.subscribe("ticker_btc_jpy").await.unwrap();
        let normalizer = TickerNormalizer::new("ticker_btc_jpy");

        let mut prev = START_PRICE;
        for _ in 0..200 {
            let Some(Ok(Inbound::Message(payload))) = conn.recv().await else {
                panic!("mock feed must yield messages");
            };
            let tick = normalizer.normalize(&payload, 0).unwrap();
            assert!((PRICE_FLOOR..=PRICE_CEILING).contains(&tick.price));
            assert!((tick.price - prev).abs() <= prev * MAX_STEP + 1.0);
            let (sell, buy) = (tick.sell.unwrap(), tick.buy.unwrap());
            assert!(sell >= tick.price && sell - tick.price <= MAX_SPREAD);
            assert!(buy <= tick.price && tick.price - buy <= MAX_SPREAD);
            assert_eq!(tick.timestamp_ms, 1_000);
            prev = tick.price;
        }
        assert!((transport.price() - prev).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn walk_continues_across_connections() {
        let mut transport = MockTransport::new(1).with_interval(0..=0);
        let mut first = transport.connect().await.unwrap();
        first.subscribe("ticker_btc_jpy").await.unwrap();
        let _ = first.recv().await;
        let after_first = transport.price();

        let mut second = transport.connect().await.unwrap();
        second.subscribe("ticker_btc_jpy").await.unwrap();
        let Some(Ok(Inbound::Message(payload))) = second.recv().await else {
            panic!("expected a ticker");
        };
        let last: f64 = payload["last"].as_str().unwrap().parse().unwrap();
        assert!((last - after_first).abs() <= after_first * MAX_STEP + 1.0);
    }
}
