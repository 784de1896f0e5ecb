use serde::Deserialize;

use crate::error::FeedError;
use crate::model::candle::Candle;
use crate::model::timeframe::Timeframe;

/// Deserialize bitbank numbers that arrive either as strings or JSON numbers.
pub fn string_or_number_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("invalid number")),
        _ => Err(serde::de::Error::custom("invalid numeric value")),
    }
}

pub fn string_or_number_to_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::String(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("invalid integer")),
        _ => Err(serde::de::Error::custom("invalid integer value")),
    }
}

/// bitbank reports `success` as `1`/`0`; accept booleans too.
pub fn int_or_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::Number(n) => Ok(n.as_i64() == Some(1)),
        _ => Err(serde::de::Error::custom("invalid success flag")),
    }
}

/// `GET /{pair}/candlestick/{type}/{key}` response envelope.
#[derive(Debug, Deserialize)]
pub struct CandlestickResponse {
    #[serde(deserialize_with = "int_or_bool")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<CandlestickData>,
}

#[derive(Debug, Deserialize)]
pub struct CandlestickData {
    #[serde(default)]
    pub candlestick: Vec<CandlestickSeries>,
    /// Present on error responses.
    #[serde(default)]
    pub code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CandlestickSeries {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub ohlcv: Vec<OhlcvRow>,
}

/// `[open, high, low, close, volume, timestamp]`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OhlcvRow(
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_f64")] pub f64,
    #[serde(deserialize_with = "string_or_number_to_u64")] pub u64,
);

impl OhlcvRow {
    pub fn to_candle(&self, timeframe: Timeframe) -> Candle {
        let OhlcvRow(open, high, low, close, volume, ts) = *self;
        Candle::from_ohlcv(ts, timeframe.width_ms(), open, high, low, close, volume)
    }
}

impl CandlestickResponse {
    /// Candles of the first series. A non-success envelope or a missing
    /// series is an error for this partition.
    pub fn into_candles(self, key: &str, timeframe: Timeframe) -> Result<Vec<Candle>, FeedError> {
        let fail = |reason: String| FeedError::PartitionFetch {
            key: key.to_string(),
            reason,
        };
        let data = self.data.ok_or_else(|| fail("response has no data".to_string()))?;
        if !self.success {
            return Err(fail(format!("api error code {}", data.code.unwrap_or(-1))));
        }
        let series = data
            .candlestick
            .into_iter()
            .next()
            .ok_or_else(|| fail("no candlestick series".to_string()))?;
        Ok(series
            .ohlcv
            .iter()
            .map(|row| row.to_candle(timeframe))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_candlestick_response() {
        let json = r#"{
            "success": 1,
            "data": {
                "candlestick": [{
                    "type": "5min",
                    "ohlcv": [
                        ["15500000", "15520000", "15490000", "15510000", "1.2345", 1709337600000],
                        ["15510000", "15530000", "15500000", "15525000", "0.5", "1709337900000"]
                    ]
                }],
                "timestamp": 1709338000000
            }
        }"#;
        let resp: CandlestickResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        let candles = resp.into_candles("20240302", Timeframe::Min5).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].start_time, 1_709_337_600_000);
        assert_eq!(candles[0].end_time, 1_709_337_900_000);
        assert!((candles[0].high - 15_520_000.0).abs() < f64::EPSILON);
        assert!((candles[1].volume - 0.5).abs() < f64::EPSILON);
        assert_eq!(candles[1].start_time, 1_709_337_900_000);
    }

    #[test]
    fn error_envelope_is_partition_failure() {
        let json = r#"{"success": 0, "data": {"code": 10000}}"#;
        let resp: CandlestickResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_candles("2024", Timeframe::Day1).unwrap_err();
        assert!(err.to_string().contains("10000"));
    }

    #[test]
    fn missing_series_is_partition_failure() {
        let json = r#"{"success": true, "data": {"candlestick": []}}"#;
        let resp: CandlestickResponse = serde_json::from_str(json).unwrap();
        assert!(resp.into_candles("2024", Timeframe::Day1).is_err());
    }

    #[test]
    fn malformed_row_fails_to_parse() {
        let json = r#"{"success": 1, "data": {"candlestick": [{"ohlcv": [["x", "1", "1", "1", "1", 0]]}]}}"#;
        assert!(serde_json::from_str::<CandlestickResponse>(json).is_err());
    }
}
