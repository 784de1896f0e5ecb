pub mod candle;
pub mod tick;
pub mod timeframe;
