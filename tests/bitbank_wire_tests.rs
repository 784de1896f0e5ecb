use crypto_stacker::bitbank::rest::BitbankRestClient;
use crypto_stacker::bitbank::socketio::{self, Packet};
use crypto_stacker::bitbank::types::CandlestickResponse;
use crypto_stacker::model::timeframe::Timeframe;
use crypto_stacker::stream::TickerNormalizer;

#[test]
fn socketio_ticker_frame_becomes_a_tick() {
    let frame = r#"42["message",{"room_name":"ticker_btc_jpy","message":{"pid":1,"data":{"sell":"15501000","buy":"15499000","high":"15800000","low":"15100000","open":"15300000","last":"15500000","vol":"321.5","timestamp":1709380800123}}}]"#;
    let Packet::Event(payload) = socketio::decode(frame) else {
        panic!("expected an event packet");
    };
    let tick = TickerNormalizer::new("ticker_btc_jpy")
        .normalize(&payload, 0)
        .unwrap();
    assert_eq!(tick.price, 15_500_000.0);
    assert_eq!(tick.mid(), Some(15_500_000.0));
    assert_eq!(tick.volume, Some(321.5));
    assert_eq!(tick.timestamp_ms, 1_709_380_800_123);
}

#[test]
fn other_room_events_are_ignored() {
    let frame = r#"42["message",{"room_name":"depth_diff_btc_jpy","message":{"data":{"a":[],"b":[]}}}]"#;
    let Packet::Event(payload) = socketio::decode(frame) else {
        panic!("expected an event packet");
    };
    assert!(TickerNormalizer::new("ticker_btc_jpy")
        .normalize(&payload, 0)
        .is_none());
}

#[test]
fn handshake_frames() {
    assert_eq!(
        socketio::decode(r#"0{"sid":"x","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#),
        Packet::Open
    );
    assert_eq!(socketio::decode("44{\"message\":\"nope\"}"), Packet::ConnectError("{\"message\":\"nope\"}".to_string()));
    assert_eq!(socketio::CONNECT, "40");
    assert_eq!(socketio::PONG, "3");
}

#[test]
fn yearly_partition_response_parses_into_daily_candles() {
    let body = r#"{"success":1,"data":{"candlestick":[{"type":"1day","ohlcv":[
        [15000000,15600000,14900000,15500000,"812.1",1709251200000],
        ["15500000","15700000","15400000","15650000",790,1709337600000]
    ]}],"timestamp":1709380800000}}"#;
    let resp: CandlestickResponse = serde_json::from_str(body).unwrap();
    let candles = resp.into_candles("2024", Timeframe::Day1).unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[1].start_time - candles[0].start_time, Timeframe::Day1.width_ms());
    assert!(candles.iter().all(|c| c.is_consistent() && c.tick_count == 0));
}

#[test]
fn rest_urls_follow_partition_keys() {
    let client = BitbankRestClient::new("https://public.bitbank.cc", "btc_jpy");
    assert_eq!(
        client.candlestick_url(Timeframe::Month1, "2024"),
        "https://public.bitbank.cc/btc_jpy/candlestick/1month/2024"
    );
}
