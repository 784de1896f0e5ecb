use std::rc::Rc;

use tokio::sync::watch;

use super::normalize::TickerNormalizer;
use super::reconnect::{ExponentialBackoff, ReconnectPolicy};
use super::transport::{Connection, Inbound, Sleeper, Transport};
use super::ConnectionState;
use crate::clock::{Clock, SystemClock};
use crate::error::FeedError;
use crate::event::{Subscribers, Subscription};
use crate::model::tick::Tick;

/// What the owner of a [`StreamHandle`] wants the client to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Run,
    /// Drop the current connection and start over with a fresh budget.
    Reconnect,
    Disconnect,
}

/// Why [`StreamClient::connect_and_run`] returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Disconnected,
    ReconnectRequested,
    /// Every [`StreamHandle`] was dropped.
    Closed,
}

/// Remote control for a running [`StreamClient`].
#[derive(Debug)]
pub struct StreamHandle {
    tx: watch::Sender<StreamControl>,
}

impl StreamHandle {
    pub fn new() -> (Self, watch::Receiver<StreamControl>) {
        let (tx, rx) = watch::channel(StreamControl::Run);
        (Self { tx }, rx)
    }

    /// Start again after a disconnect or after the client gave up.
    pub fn connect(&self) {
        self.tx.send_replace(StreamControl::Run);
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        self.tx.send_replace(StreamControl::Disconnect);
    }

    pub fn reconnect(&self) {
        self.tx.send_replace(StreamControl::Reconnect);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamStatus {
    pub connected: bool,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub last_tick: Option<Tick>,
    pub dropped_messages: u64,
}

enum Pumped {
    Interrupted(RunExit),
    Lost(String),
}

/// Ticker stream with bounded exponential-backoff reconnection.
///
/// Each established connection subscribes to `ticker_{pair}`; payloads are
/// normalized into [`Tick`]s and fanned out to `on_message` subscribers.
pub struct StreamClient<T: Transport, S: Sleeper> {
    transport: T,
    sleeper: S,
    backoff: ExponentialBackoff,
    channel: String,
    normalizer: TickerNormalizer,
    clock: Rc<dyn Clock>,
    state: ConnectionState,
    last_tick: Option<Tick>,
    dropped: u64,
    on_connect: Subscribers<()>,
    on_disconnect: Subscribers<String>,
    on_message: Subscribers<Tick>,
    on_error: Subscribers<FeedError>,
    on_status: Subscribers<ConnectionState>,
}

impl<T: Transport, S: Sleeper> StreamClient<T, S> {
    pub fn new(transport: T, sleeper: S, pair: &str, policy: ReconnectPolicy) -> Self {
        let channel = format!("ticker_{}", pair.to_ascii_lowercase());
        Self {
            transport,
            sleeper,
            backoff: ExponentialBackoff::new(policy),
            normalizer: TickerNormalizer::new(channel.clone()),
            channel,
            clock: Rc::new(SystemClock),
            state: ConnectionState::Disconnected,
            last_tick: None,
            dropped: 0,
            on_connect: Subscribers::new(),
            on_disconnect: Subscribers::new(),
            on_message: Subscribers::new(),
            on_error: Subscribers::new(),
            on_status: Subscribers::new(),
        }
    }

    /// Clock used to stamp ticks that carry no timestamp.
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn on_connect(&mut self, f: impl FnMut(&()) + 'static) -> Subscription {
        self.on_connect.subscribe(f)
    }

    pub fn on_disconnect(&mut self, f: impl FnMut(&String) + 'static) -> Subscription {
        self.on_disconnect.subscribe(f)
    }

    pub fn on_message(&mut self, f: impl FnMut(&Tick) + 'static) -> Subscription {
        self.on_message.subscribe(f)
    }

    pub fn on_error(&mut self, f: impl FnMut(&FeedError) + 'static) -> Subscription {
        self.on_error.subscribe(f)
    }

    pub fn on_status(&mut self, f: impl FnMut(&ConnectionState) + 'static) -> Subscription {
        self.on_status.subscribe(f)
    }

    /// Remove a subscription from whichever registry holds it.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.on_connect.unsubscribe(subscription)
            | self.on_disconnect.unsubscribe(subscription)
            | self.on_message.unsubscribe(subscription)
            | self.on_error.unsubscribe(subscription)
            | self.on_status.unsubscribe(subscription)
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            connected: self.state.is_connected(),
            state: self.state,
            reconnect_attempts: self.backoff.attempts(),
            last_tick: self.last_tick.clone(),
            dropped_messages: self.dropped,
        }
    }

    /// Connect, subscribe and pump messages, reconnecting on loss until the
    /// backoff budget runs out. A control change cancels any in-flight
    /// connect, read or reconnect delay.
    pub async fn connect_and_run(
        &mut self,
        control: &mut watch::Receiver<StreamControl>,
    ) -> Result<RunExit, FeedError> {
        self.backoff.reset();
        loop {
            self.set_state(ConnectionState::Connecting);
            let opened = tokio::select! {
                res = self.transport.connect() => Ok(res),
                exit = interrupted(control) => Err(exit),
            };
            match opened {
                Err(exit) => return Ok(self.stop(exit)),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, channel = %self.channel, "Stream connect failed");
                    self.set_state(ConnectionState::Disconnected);
                    self.on_error.emit(&e);
                }
                Ok(Ok(mut conn)) => {
                    let pumped = self.pump(&mut conn, control).await;
                    conn.close().await;
                    let reason = match pumped {
                        Ok(Pumped::Interrupted(exit)) => return Ok(self.stop(exit)),
                        Ok(Pumped::Lost(reason)) => reason,
                        Err(e) => {
                            let reason = e.to_string();
                            self.on_error.emit(&e);
                            reason
                        }
                    };
                    tracing::warn!(reason = %reason, "Stream connection lost");
                    self.set_state(ConnectionState::Disconnected);
                    self.on_disconnect.emit(&reason);
                }
            }

            let Some(delay) = self.backoff.next_delay() else {
                let err = FeedError::ReconnectExhausted {
                    attempts: self.backoff.attempts(),
                };
                tracing::error!(error = %err, "Stream reconnect budget exhausted");
                self.set_state(ConnectionState::GaveUp);
                self.on_error.emit(&err);
                return Err(err);
            };
            self.set_state(ConnectionState::Reconnecting {
                attempt: self.backoff.attempts(),
                delay_ms: delay.as_millis() as u64,
            });
            let cancelled = tokio::select! {
                _ = self.sleeper.sleep(delay) => None,
                exit = interrupted(control) => Some(exit),
            };
            if let Some(exit) = cancelled {
                return Ok(self.stop(exit));
            }
        }
    }

    /// Supervisor loop: runs the connection, restarts it on request, and
    /// parks after a disconnect or give-up until told to connect again.
    /// Returns once every control handle is dropped.
    pub async fn run(&mut self, mut control: watch::Receiver<StreamControl>) {
        loop {
            let wanted = *control.borrow_and_update();
            let exit = if wanted == StreamControl::Disconnect {
                RunExit::Disconnected
            } else {
                match self.connect_and_run(&mut control).await {
                    Ok(exit) => exit,
                    Err(_) => RunExit::Disconnected,
                }
            };
            match exit {
                RunExit::ReconnectRequested => {
                    tracing::info!(channel = %self.channel, "Manual reconnect");
                }
                RunExit::Closed => return,
                RunExit::Disconnected => loop {
                    if control.changed().await.is_err() {
                        return;
                    }
                    if *control.borrow_and_update() != StreamControl::Disconnect {
                        break;
                    }
                },
            }
        }
    }

    async fn pump(
        &mut self,
        conn: &mut T::Conn,
        control: &mut watch::Receiver<StreamControl>,
    ) -> Result<Pumped, FeedError> {
        self.backoff.reset();
        self.set_state(ConnectionState::Connected);
        conn.subscribe(&self.channel).await?;
        tracing::info!(channel = %self.channel, "Stream subscribed");
        self.on_connect.emit(&());

        loop {
            let next = tokio::select! {
                msg = conn.recv() => Ok(msg),
                exit = interrupted(control) => Err(exit),
            };
            match next {
                Err(exit) => return Ok(Pumped::Interrupted(exit)),
                Ok(None) => return Ok(Pumped::Lost("stream ended".to_string())),
                Ok(Some(Err(e))) => return Err(e),
                Ok(Some(Ok(Inbound::Unrecognized))) => {
                    self.drop_frame(FeedError::MalformedStreamMessage(
                        "unrecognized frame".to_string(),
                    ));
                }
                Ok(Some(Ok(Inbound::Message(payload)))) => {
                    match self.normalizer.normalize(&payload, self.clock.now_ms()) {
                        Some(tick) => {
                            self.on_message.emit(&tick);
                            self.last_tick = Some(tick);
                        }
                        None => self.drop_frame(FeedError::MalformedStreamMessage(format!(
                            "no {} ticker in {}",
                            self.channel, payload
                        ))),
                    }
                }
            }
        }
    }

    /// Malformed frames are counted and logged, never surfaced to `on_error`.
    fn drop_frame(&mut self, err: FeedError) {
        self.dropped += 1;
        tracing::debug!(error = %err, dropped = self.dropped, "Dropped stream frame");
    }

    fn stop(&mut self, exit: RunExit) -> RunExit {
        self.set_state(ConnectionState::Disconnected);
        exit
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = %self.state, to = %state, "Stream state");
        self.state = state;
        self.on_status.emit(&state);
    }
}

/// Resolves on the first control change that interrupts a live connection.
async fn interrupted(control: &mut watch::Receiver<StreamControl>) -> RunExit {
    loop {
        if control.changed().await.is_err() {
            return RunExit::Closed;
        }
        match *control.borrow_and_update() {
            StreamControl::Run => continue,
            StreamControl::Reconnect => return RunExit::ReconnectRequested,
            StreamControl::Disconnect => return RunExit::Disconnected,
        }
    }
}
