use std::time::Duration;

use crate::backfill::CandleSource;
use crate::error::FeedError;
use crate::model::candle::Candle;
use crate::model::timeframe::Timeframe;

use super::types::CandlestickResponse;

/// Public (unauthenticated) bitbank REST client.
#[derive(Debug, Clone)]
pub struct BitbankRestClient {
    http: reqwest::Client,
    base_url: String,
    pair: String,
}

impl BitbankRestClient {
    pub fn new(base_url: &str, pair: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            pair: pair.to_ascii_lowercase(),
        }
    }

    pub fn candlestick_url(&self, timeframe: Timeframe, key: &str) -> String {
        format!(
            "{}/{}/candlestick/{}/{}",
            self.base_url,
            self.pair,
            timeframe.wire_name(),
            key
        )
    }

    pub async fn get_candlesticks(
        &self,
        timeframe: Timeframe,
        key: &str,
    ) -> Result<Vec<Candle>, FeedError> {
        let url = self.candlestick_url(timeframe, key);
        tracing::debug!(%url, "Fetching candlestick partition");

        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(FeedError::PartitionFetch {
                key: key.to_string(),
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let body = resp.text().await?;
        let parsed: CandlestickResponse =
            serde_json::from_str(&body).map_err(|e| FeedError::PartitionFetch {
                key: key.to_string(),
                reason: format!("invalid response: {}", e),
            })?;
        parsed.into_candles(key, timeframe)
    }
}

impl CandleSource for BitbankRestClient {
    async fn fetch_partition(
        &self,
        timeframe: Timeframe,
        key: &str,
    ) -> Result<Vec<Candle>, FeedError> {
        self.get_candlesticks(timeframe, key).await
    }
}
