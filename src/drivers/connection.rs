use std::time::{Duration, Instant};
use crate::drivers::protocol::{self, InboundMessage};
use crate::drivers::ScopeError;
/// Close code for an orderly, user-requested close. Never triggers a reconnect.
pub const CLOSE_NORMAL: u16 = 1000;
/// Reported when the transport vanished without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Sent when we tear down a link that stopped answering.
pub const CLOSE_UNRESPONSIVE: u16 = 4000;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectPending,
}
/// What observers are shown. Lags `ConnectionState` by the status debounce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Offline,
    Connecting,
    Online,
    Reconnecting,
}
impl LinkStatus {
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Offline => "Disconnected",
            LinkStatus::Connecting => "Connecting...",
            LinkStatus::Online => "Connected",
            LinkStatus::Reconnecting => "Reconnecting...",
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub status: LinkStatus,
    pub backoff_attempt: u32,
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConnectionTimings {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub heartbeat_interval: Duration,
    pub pong_timeout: Duration,
    /// A probe is only sent once the link has been quiet this long.
    pub min_idle: Duration,
    pub status_debounce: Duration,
    pub health_check_interval: Duration,
    /// Silence longer than this on a connected link counts as a failure.
    pub silence_timeout: Option<Duration>,
}
impl Default for ConnectionTimings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_millis(8_000),
            heartbeat_interval: Duration::from_millis(25_000),
            pong_timeout: Duration::from_millis(20_000),
            min_idle: Duration::from_millis(3_000),
            status_debounce: Duration::from_millis(1_500),
            health_check_interval: Duration::from_millis(2_000),
            silence_timeout: None,
        }
    }
}
impl ConnectionTimings {
    /// `min(base * 2^attempt, max)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
/// Everything the transport can tell the state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Closed { code: u16 },
    OpenFailed(String),
}
/// Side effects the driver must carry out, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Open a fresh transport, discarding any previous one.
    Open,
    Send(&'static str),
    Close { code: u16 },
    Deliver(InboundMessage),
    Status(LinkStatus),
}
/// Connect / heartbeat / reconnect state machine.
///
/// Pure: time is passed in and timers are kept as deadlines, so the driver only
/// has to sleep until `next_deadline()` and call `poll_timers`.
pub struct ConnectionManager {
    timings: ConnectionTimings,
    state: ConnectionState,
    reported: LinkStatus,
    backoff_attempt: u32,
    last_activity: Option<Instant>,
    reconnect_at: Option<Instant>,
    probe_at: Option<Instant>,
    pong_deadline: Option<Instant>,
    debounce_at: Option<Instant>,
    health_check_at: Option<Instant>,
    shut_down: bool,
}
impl ConnectionManager {
    pub fn new(timings: ConnectionTimings) -> Self {
        Self {
            timings,
            state: ConnectionState::Disconnected,
            reported: LinkStatus::Offline,
            backoff_attempt: 0,
            last_activity: None,
            reconnect_at: None,
            probe_at: None,
            pong_deadline: None,
            debounce_at: None,
            health_check_at: None,
            shut_down: false,
        }
    }
    pub fn state(&self) -> ConnectionState {
        self.state
    }
    pub fn backoff_attempt(&self) -> u32 {
        self.backoff_attempt
    }
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.state,
            status: self.reported,
            backoff_attempt: self.backoff_attempt,
        }
    }
    /// Starts a connection attempt. No-op while connecting, connected, or after shutdown.
    pub fn connect(&mut self, _now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.shut_down
            || matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Connected
            )
        {
            return actions;
        }
        self.reconnect_at = None;
        self.begin_attempt(&mut actions);
        actions
    }
    /// User-initiated close. Cancels every timer; `connect` may be called again later.
    pub fn disconnect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            actions.push(Action::Close { code: CLOSE_NORMAL });
        }
        self.clear_timers();
        if self.state != ConnectionState::Disconnected {
            log::info!("connection closed by user");
        }
        self.state = ConnectionState::Disconnected;
        self.report(LinkStatus::Offline, &mut actions);
        actions
    }
    /// Final teardown. Idempotent; nothing reconnects afterwards.
    pub fn shutdown(&mut self) -> Vec<Action> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;
        self.disconnect()
    }
    pub fn handle(&mut self, event: TransportEvent, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.shut_down {
            return actions;
        }
        match event {
            TransportEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    return actions;
                }
                log::info!("connected");
                self.state = ConnectionState::Connected;
                self.backoff_attempt = 0;
                self.last_activity = Some(now);
                self.debounce_at = None;
                self.pong_deadline = None;
                self.probe_at = Some(now + self.timings.heartbeat_interval);
                self.health_check_at = self
                    .timings
                    .silence_timeout
                    .map(|_| now + self.timings.health_check_interval);
                self.report(LinkStatus::Online, &mut actions);
            }
            TransportEvent::Frame(text) => {
                if self.state != ConnectionState::Connected {
                    return actions;
                }
                self.last_activity = Some(now);
                if self.reported != LinkStatus::Online {
                    self.debounce_at = None;
                    self.report(LinkStatus::Online, &mut actions);
                }
                match protocol::decode_frame(&text) {
                    Ok(Some(message)) => {
                        if message == InboundMessage::Pong {
                            self.pong_deadline = None;
                        }
                        actions.push(Action::Deliver(message));
                    }
                    Ok(None) => log::debug!("ignoring frame of unknown type: {text}"),
                    Err(ScopeError::MissingType) => log::debug!("dropping untyped frame: {text}"),
                    Err(err) => log::debug!("dropping frame: {err}"),
                }
            }
            TransportEvent::Closed { code } => {
                if !matches!(
                    self.state,
                    ConnectionState::Connecting | ConnectionState::Connected
                ) {
                    return actions;
                }
                log::info!("transport closed with code {code}");
                self.stop_heartbeat();
                if code == CLOSE_NORMAL {
                    self.state = ConnectionState::Disconnected;
                    self.debounce_at = None;
                    self.report(LinkStatus::Offline, &mut actions);
                } else {
                    self.enter_reconnect(now);
                }
            }
            TransportEvent::OpenFailed(reason) => {
                if self.state != ConnectionState::Connecting {
                    return actions;
                }
                log::warn!("connection attempt failed: {reason}");
                self.stop_heartbeat();
                self.enter_reconnect(now);
            }
        }
        actions
    }
    /// Fires every timer whose deadline is at or before `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.shut_down {
            return actions;
        }
        if due(self.reconnect_at, now) {
            self.reconnect_at = None;
            if self.state == ConnectionState::ReconnectPending {
                self.begin_attempt(&mut actions);
            }
        }
        if due(self.debounce_at, now) {
            self.debounce_at = None;
            if self.state != ConnectionState::Connected {
                self.report(LinkStatus::Reconnecting, &mut actions);
            }
        }
        if self.state != ConnectionState::Connected {
            return actions;
        }
        if due(self.pong_deadline, now) {
            log::warn!("no pong within {:?}; dropping link", self.timings.pong_timeout);
            self.force_close(now, &mut actions);
            return actions;
        }
        if due(self.health_check_at, now) {
            self.health_check_at = Some(now + self.timings.health_check_interval);
            if let (Some(limit), Some(last)) = (self.timings.silence_timeout, self.last_activity) {
                if now.saturating_duration_since(last) > limit {
                    log::warn!("no traffic for {limit:?}; dropping link");
                    self.force_close(now, &mut actions);
                    return actions;
                }
            }
        }
        if due(self.probe_at, now) {
            self.probe_at = Some(now + self.timings.heartbeat_interval);
            let idle = self
                .last_activity
                .map_or(Duration::MAX, |last| now.saturating_duration_since(last));
            if idle >= self.timings.min_idle && self.pong_deadline.is_none() {
                actions.push(Action::Send(protocol::PROBE));
                self.pong_deadline = Some(now + self.timings.pong_timeout);
            }
        }
        actions
    }
    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.reconnect_at,
            self.debounce_at,
            self.pong_deadline,
            self.health_check_at,
            self.probe_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }
    fn begin_attempt(&mut self, actions: &mut Vec<Action>) {
        self.state = ConnectionState::Connecting;
        if self.reported == LinkStatus::Offline {
            self.report(LinkStatus::Connecting, actions);
        }
        actions.push(Action::Open);
    }
    fn force_close(&mut self, now: Instant, actions: &mut Vec<Action>) {
        actions.push(Action::Close {
            code: CLOSE_UNRESPONSIVE,
        });
        self.stop_heartbeat();
        self.enter_reconnect(now);
    }
    fn enter_reconnect(&mut self, now: Instant) {
        let delay = self.timings.backoff_delay(self.backoff_attempt);
        self.backoff_attempt = self.backoff_attempt.saturating_add(1);
        self.state = ConnectionState::ReconnectPending;
        self.reconnect_at = Some(now + delay);
        if self.debounce_at.is_none() && self.reported != LinkStatus::Reconnecting {
            self.debounce_at = Some(now + self.timings.status_debounce);
        }
        log::info!(
            "reconnecting in {} ms (attempt {})",
            delay.as_millis(),
            self.backoff_attempt
        );
    }
    fn stop_heartbeat(&mut self) {
        self.probe_at = None;
        self.pong_deadline = None;
        self.health_check_at = None;
    }
    fn clear_timers(&mut self) {
        self.stop_heartbeat();
        self.reconnect_at = None;
        self.debounce_at = None;
    }
    fn report(&mut self, status: LinkStatus, actions: &mut Vec<Action>) {
        if self.reported != status {
            self.reported = status;
            actions.push(Action::Status(status));
        }
    }
}
fn due(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|at| at <= now)
}
