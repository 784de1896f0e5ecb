use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, LocalSet};

use crypto_stacker::backfill::{CandleSource, HistoricalFetcher};
use crypto_stacker::bitbank::rest::BitbankRestClient;
use crypto_stacker::bitbank::ws::BitbankSocketTransport;
use crypto_stacker::clock::{Clock, SystemClock};
use crypto_stacker::config::Config;
use crypto_stacker::event::AppEvent;
use crypto_stacker::feed::MockTransport;
use crypto_stacker::input::{parse_command, UiCommand};
use crypto_stacker::model::timeframe::Timeframe;
use crypto_stacker::session::ChartSession;
use crypto_stacker::stream::{
    ConnectionState, Sleeper, StreamClient, StreamControl, StreamHandle, TokioSleeper, Transport,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(1);
const STREAM_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config)?;
    tracing::info!(
        symbol = %config.exchange.symbol,
        rest_url = %config.exchange.rest_base_url,
        ws_url = %config.exchange.ws_url,
        timeframe = %config.chart.timeframe,
        mock = config.stream.mock,
        "Starting crypto-stacker"
    );

    // Everything runs on one thread; stream callbacks and the session are !Send.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    LocalSet::new().block_on(&runtime, run(config))
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match &config.logging.file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false)
                .json()
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .init();
        }
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let (app_tx, mut app_rx) = mpsc::channel::<AppEvent>(256);
    let (stream_handle, control_rx) = StreamHandle::new();

    let rest = BitbankRestClient::new(&config.exchange.rest_base_url, &config.exchange.symbol);
    let fetcher = HistoricalFetcher::new(rest, SystemClock, config.exchange.partition_offset()?);
    let mut session = ChartSession::new(
        fetcher,
        config.chart.timeframe,
        config.chart.window_capacity,
        config.chart.backfill_count,
    );
    spawn_backfill(&mut session, config.chart.timeframe, &app_tx);

    let policy = config.stream.reconnect_policy();
    let symbol = config.exchange.symbol.as_str();
    let stream_task = if config.stream.mock {
        let transport = MockTransport::new(SystemClock.now_ms());
        spawn_stream(
            StreamClient::new(transport, TokioSleeper, symbol, policy),
            control_rx,
            app_tx.clone(),
        )
    } else {
        let transport = BitbankSocketTransport::new(config.exchange.ws_url.clone());
        spawn_stream(
            StreamClient::new(transport, TokioSleeper, symbol, policy),
            control_rx,
            app_tx.clone(),
        )
    };
    spawn_stdin(app_tx.clone());

    let mut stream_state = ConnectionState::Disconnected;
    let mut status_tick = tokio::time::interval(STATUS_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(event) = app_rx.recv() => match event {
                AppEvent::MarketTick(tick) => {
                    if let Some(closed) = session.on_tick(&tick).and_then(|i| i.completed) {
                        tracing::info!(
                            start = closed.start_time,
                            open = closed.open,
                            high = closed.high,
                            low = closed.low,
                            close = closed.close,
                            ticks = closed.tick_count,
                            "Candle closed"
                        );
                    }
                }
                AppEvent::WsStatus(state) => stream_state = state,
                AppEvent::WsDisconnected(reason) => {
                    tracing::warn!(reason = %reason, "Stream disconnected");
                }
                AppEvent::WsError(message) => {
                    tracing::warn!(error = %message, "Stream error");
                }
                AppEvent::HistoricalCandles { ticket, backfill } => {
                    session.apply_backfill(ticket, backfill);
                }
                AppEvent::Command(command) => match command {
                    UiCommand::SwitchTimeframe(tf) => spawn_backfill(&mut session, tf, &app_tx),
                    UiCommand::Connect => stream_handle.connect(),
                    UiCommand::Disconnect => stream_handle.disconnect(),
                    UiCommand::Reconnect => stream_handle.reconnect(),
                    UiCommand::Snapshot => print_snapshot(&session),
                    UiCommand::Quit => {
                        tracing::info!("Quit requested");
                        break;
                    }
                },
            },
            _ = status_tick.tick() => {
                log_status(&session, stream_state, policy.max_attempts);
            }
            _ = &mut ctrl_c => {
                tracing::info!("Ctrl+C received");
                break;
            }
        }
    }

    stream_handle.disconnect();
    session.shutdown();
    drop(stream_handle);
    if tokio::time::timeout(STREAM_SHUTDOWN_GRACE, stream_task)
        .await
        .is_err()
    {
        tracing::warn!("Stream task did not stop in time");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn spawn_backfill<S, C>(
    session: &mut ChartSession<S, C>,
    timeframe: Timeframe,
    app_tx: &mpsc::Sender<AppEvent>,
) where
    S: CandleSource + 'static,
    C: Clock + 'static,
{
    let (ticket, fetch) = session.begin_backfill(timeframe);
    let tx = app_tx.clone();
    tokio::task::spawn_local(async move {
        let backfill = fetch.await;
        if tx
            .send(AppEvent::HistoricalCandles { ticket, backfill })
            .await
            .is_err()
        {
            tracing::debug!(?ticket, "Session gone before backfill arrived");
        }
    });
}

fn spawn_stream<T, S>(
    mut client: StreamClient<T, S>,
    control: watch::Receiver<StreamControl>,
    app_tx: mpsc::Sender<AppEvent>,
) -> JoinHandle<()>
where
    T: Transport + 'static,
    T::Conn: 'static,
    S: Sleeper + 'static,
{
    let tx = app_tx.clone();
    client.on_message(move |tick| forward(&tx, AppEvent::MarketTick(tick.clone())));
    let tx = app_tx.clone();
    client.on_status(move |state| forward(&tx, AppEvent::WsStatus(*state)));
    let tx = app_tx.clone();
    client.on_disconnect(move |reason| forward(&tx, AppEvent::WsDisconnected(reason.clone())));
    client.on_error(move |err| forward(&app_tx, AppEvent::WsError(err.to_string())));

    tokio::task::spawn_local(async move {
        client.run(control).await;
        tracing::info!("Stream task stopped");
    })
}

fn forward(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
    if tx.try_send(event).is_err() {
        tracing::warn!("Event channel full, dropping event");
    }
}

fn spawn_stdin(app_tx: mpsc::Sender<AppEvent>) {
    tokio::task::spawn_local(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(command) => {
                        if app_tx.send(AppEvent::Command(command)).await.is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!(input = %line.trim(), "Unknown command"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
}

fn log_status<S, C>(session: &ChartSession<S, C>, state: ConnectionState, max_attempts: u32)
where
    S: CandleSource + 'static,
    C: Clock + 'static,
{
    let progress = match state {
        ConnectionState::Reconnecting { attempt, .. } => format!("{attempt}/{max_attempts}"),
        _ => "-".to_string(),
    };
    let stats = session.price_stats();
    tracing::info!(
        state = %state,
        reconnect = %progress,
        timeframe = %session.timeframe(),
        candles = session.store().completed_len(),
        last = ?stats.last,
        high = ?stats.high,
        low = ?stats.low,
        direction = %stats.direction,
        provenance = ?session.provenance(),
        "Status"
    );
}

fn print_snapshot<S, C>(session: &ChartSession<S, C>)
where
    S: CandleSource + 'static,
    C: Clock + 'static,
{
    let candles = session.snapshot();
    println!(
        "{} candles, timeframe {}, provenance {:?}",
        candles.len(),
        session.timeframe(),
        session.provenance()
    );
    for c in candles.iter().rev().take(20).rev() {
        let start = chrono::DateTime::from_timestamp_millis(c.start_time as i64)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| c.start_time.to_string());
        println!(
            "{start}  o {:>12.0}  h {:>12.0}  l {:>12.0}  c {:>12.0}  v {:>10.4}  n {}",
            c.open, c.high, c.low, c.close, c.volume, c.tick_count
        );
    }
}
