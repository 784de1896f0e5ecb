//! Turn ticker payloads of several envelope shapes into [`Tick`]s.

use serde_json::{Map, Value};

use crate::model::tick::Tick;

/// Last millisecond of year 9999 UTC. Later wire timestamps fall back to
/// receipt time.
pub const MAX_TIMESTAMP_MS: u64 = 253_402_300_799_999;

/// Accepts, for one room:
///
/// - `["message", {"room_name": room, "message": {"data": {...}}}]`
/// - `{"room_name": room, "message": {"data": {...}}}` (or `message` holding the ticker directly)
/// - a bare ticker object with `sell`, `buy` and `last`
#[derive(Debug, Clone)]
pub struct TickerNormalizer {
    room: String,
}

impl TickerNormalizer {
    pub fn new(room: impl Into<String>) -> Self {
        Self { room: room.into() }
    }

    /// `None` when the payload is not a ticker for this room.
    pub fn normalize(&self, payload: &Value, received_at_ms: u64) -> Option<Tick> {
        let ticker = self.ticker_object(payload)?;
        let price = number(ticker.get("last")?)?;
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        Some(Tick {
            price,
            sell: ticker.get("sell").and_then(number),
            buy: ticker.get("buy").and_then(number),
            volume: ticker.get("vol").and_then(number),
            timestamp_ms: ticker
                .get("timestamp")
                .and_then(integer)
                .filter(|ts| *ts <= MAX_TIMESTAMP_MS)
                .unwrap_or(received_at_ms),
        })
    }

    fn ticker_object<'a>(&self, payload: &'a Value) -> Option<&'a Map<String, Value>> {
        match payload {
            Value::Array(items) => {
                if let [Value::String(name), envelope, ..] = items.as_slice() {
                    if name == "message" {
                        if let Some(found) = self.from_envelope(envelope) {
                            return Some(found);
                        }
                    }
                }
                // Event arguments arrive one per element; take the first that fits.
                items.iter().find_map(|item| match item {
                    Value::Object(_) => self.ticker_object(item),
                    _ => None,
                })
            }
            Value::Object(obj) => {
                if obj.contains_key("room_name") {
                    self.from_envelope(payload)
                } else if is_bare_ticker(obj) {
                    Some(obj)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn from_envelope<'a>(&self, envelope: &'a Value) -> Option<&'a Map<String, Value>> {
        let obj = envelope.as_object()?;
        if obj.get("room_name")?.as_str()? != self.room {
            return None;
        }
        let message = obj.get("message")?.as_object()?;
        match message.get("data") {
            Some(Value::Object(data)) => Some(data),
            _ => Some(message),
        }
    }
}

fn is_bare_ticker(obj: &Map<String, Value>) -> bool {
    ["sell", "buy", "last"].iter().all(|k| obj.contains_key(*k))
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn integer(v: &Value) -> Option<u64> {
    match v {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
