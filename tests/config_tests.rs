use std::time::Duration;

use crypto_stacker::config::Config;
use crypto_stacker::model::timeframe::Timeframe;

#[test]
fn parse_full_toml() {
    let toml_str = r#"
[exchange]
rest_base_url = "https://public.bitbank.cc"
ws_url = "wss://stream.bitbank.cc/socket.io/?EIO=4&transport=websocket"
symbol = "eth_jpy"
partition_utc_offset_hours = 0

[chart]
timeframe = "1hour"
window_capacity = 300
backfill_count = 150

[stream]
base_delay_ms = 500
max_reconnect_attempts = 3
mock = true

[logging]
level = "debug"
file = "stacker.log"
"#;
    let config = Config::parse(toml_str).unwrap();
    assert_eq!(config.exchange.symbol, "eth_jpy");
    assert_eq!(
        config.exchange.partition_offset().unwrap().local_minus_utc(),
        0
    );
    assert_eq!(config.chart.timeframe, Timeframe::Hour1);
    assert_eq!(config.chart.window_capacity, 300);
    assert_eq!(config.chart.backfill_count, 150);
    let policy = config.stream.reconnect_policy();
    assert_eq!(policy.base_delay, Duration::from_millis(500));
    assert_eq!(policy.max_attempts, 3);
    assert!(config.stream.mock);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file.as_deref(), Some("stacker.log"));
}

#[test]
fn empty_toml_is_the_default_config() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.exchange.symbol, "btc_jpy");
    assert_eq!(
        config.exchange.partition_offset().unwrap().local_minus_utc(),
        9 * 3600
    );
    assert_eq!(config.chart.timeframe, Timeframe::Min5);
    assert_eq!(config.chart.window_capacity, 200);
    assert_eq!(config.chart.backfill_count, 100);
    assert_eq!(config.stream.base_delay_ms, 1000);
    assert_eq!(config.stream.max_reconnect_attempts, 5);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn invalid_values_are_rejected() {
    for bad in [
        "[chart]\ntimeframe = \"2h\"\n",
        "[chart]\nbackfill_count = 0\n",
        "[exchange]\nsymbol = \"  \"\n",
        "[exchange]\nrest_base_url = \"not a url\"\n",
        "[stream]\nmax_reconnect_attempts = \"five\"\n",
    ] {
        assert!(Config::parse(bad).is_err(), "accepted: {bad}");
    }
}

#[test]
fn env_overrides_apply_on_top_of_file() {
    let mut config = Config::parse("[chart]\ntimeframe = \"1m\"\n").unwrap();
    config
        .apply_env_overrides(|key| match key {
            "STACKER_TIMEFRAME" => Some("4hour".to_string()),
            "STACKER_MOCK_FEED" => Some("1".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.chart.timeframe, Timeframe::Hour4);
    assert!(config.stream.mock);
    assert_eq!(config.logging.level, "info");

    let err = config
        .apply_env_overrides(|key| (key == "STACKER_TIMEFRAME").then(|| "3m".to_string()))
        .unwrap_err();
    assert!(format!("{err:#}").contains("STACKER_TIMEFRAME"));
}
