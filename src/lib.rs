pub mod aggregator;
pub mod backfill;
pub mod bitbank;
pub mod candle_store;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod input;
pub mod model;
pub mod price_stats;
pub mod session;
pub mod stream;
