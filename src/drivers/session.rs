use std::sync::mpsc::Sender;
use std::time::Instant;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use crate::drivers::connection::{
    Action, ConnectionManager, ConnectionSnapshot, ConnectionState, ConnectionTimings,
    TransportEvent, CLOSE_ABNORMAL,
};
use crate::drivers::ScopeError;
use crate::types::{ClientCommand, ClientEvent};
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
/// Transport output, tagged with the attempt that produced it so events from a
/// replaced socket can be recognised and dropped.
struct Link {
    generation: u64,
    event: LinkEvent,
}
enum LinkEvent {
    Opened(WsSink),
    Frame(String),
    Closed(u16),
    OpenFailed(String),
}
struct Transport {
    generation: u64,
    sink: Option<WsSink>,
    reader: JoinHandle<()>,
}
struct Session {
    url: String,
    manager: ConnectionManager,
    transport: Option<Transport>,
    generation: u64,
    link_tx: mpsc::UnboundedSender<Link>,
    events: Sender<ClientEvent>,
    state_tx: watch::Sender<ConnectionState>,
    last_snapshot: ConnectionSnapshot,
}
/// Runs the connection loop until `Shutdown` arrives or the command channel closes.
///
/// Everything happens on the calling task: commands, transport output and
/// timer expiry are multiplexed with `select!`, one at a time.
pub async fn run_session(
    url: String,
    timings: ConnectionTimings,
    events: Sender<ClientEvent>,
    state_tx: watch::Sender<ConnectionState>,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
) {
    let (link_tx, mut link_rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(timings);
    let last_snapshot = manager.snapshot();
    let mut session = Session {
        url,
        manager,
        transport: None,
        generation: 0,
        link_tx,
        events,
        state_tx,
        last_snapshot,
    };
    loop {
        let deadline = session.manager.next_deadline();
        let keep_going = tokio::select! {
            command = commands.recv() => {
                let actions = match command {
                    Some(ClientCommand::Connect) => session.manager.connect(Instant::now()),
                    Some(ClientCommand::Disconnect) => session.manager.disconnect(),
                    Some(ClientCommand::Shutdown) | None => {
                        let actions = session.manager.shutdown();
                        session.apply(actions).await;
                        break;
                    }
                };
                session.apply(actions).await
            }
            Some(link) = link_rx.recv() => {
                match session.accept(link) {
                    Some(event) => {
                        let actions = session.manager.handle(event, Instant::now());
                        session.apply(actions).await
                    }
                    None => true,
                }
            }
            _ = wait_until(deadline) => {
                let actions = session.manager.poll_timers(Instant::now());
                session.apply(actions).await
            }
        };
        if !keep_going {
            let actions = session.manager.shutdown();
            session.apply(actions).await;
            break;
        }
    }
    session.drop_transport();
    log::info!("session stopped");
}
impl Session {
    /// Filters stale links and unwraps the sink of a fresh connection.
    fn accept(&mut self, link: Link) -> Option<TransportEvent> {
        if link.generation != self.generation {
            return None;
        }
        Some(match link.event {
            LinkEvent::Opened(sink) => {
                if let Some(transport) = self.transport.as_mut() {
                    transport.sink = Some(sink);
                }
                TransportEvent::Opened
            }
            LinkEvent::Frame(text) => TransportEvent::Frame(text),
            LinkEvent::Closed(code) => TransportEvent::Closed { code },
            LinkEvent::OpenFailed(reason) => TransportEvent::OpenFailed(reason),
        })
    }
    /// Executes actions in order. Returns `false` once the GUI side has gone away.
    async fn apply(&mut self, actions: Vec<Action>) -> bool {
        let mut alive = true;
        for action in actions {
            match action {
                Action::Open => self.open(),
                Action::Send(text) => {
                    if let Some(sink) = self.transport.as_mut().and_then(|t| t.sink.as_mut()) {
                        if let Err(err) = sink.send(Message::text(text)).await {
                            log::warn!("failed to send probe: {err}");
                        }
                    }
                }
                Action::Close { code } => self.close(code).await,
                Action::Deliver(message) => {
                    alive &= self.events.send(ClientEvent::Message(message)).is_ok();
                }
                Action::Status(status) => {
                    log::info!("link status: {}", status.label());
                    alive &= self
                        .events
                        .send(ClientEvent::Log(status.label().to_owned()))
                        .is_ok();
                }
            }
        }
        let snapshot = self.manager.snapshot();
        if snapshot != self.last_snapshot {
            self.last_snapshot = snapshot;
            self.state_tx.send_replace(snapshot.state);
            alive &= self.events.send(ClientEvent::Connection(snapshot)).is_ok();
        }
        alive
    }
    fn open(&mut self) {
        self.drop_transport();
        self.generation += 1;
        let generation = self.generation;
        log::info!("connecting to {} (attempt #{generation})", self.url);
        let reader = tokio::spawn(read_link(
            self.url.clone(),
            generation,
            self.link_tx.clone(),
        ));
        self.transport = Some(Transport {
            generation,
            sink: None,
            reader,
        });
    }
    async fn close(&mut self, code: u16) {
        if let Some(mut transport) = self.transport.take() {
            if let Some(sink) = transport.sink.as_mut() {
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: "".into(),
                };
                if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                    log::debug!("close frame not sent: {err}");
                }
            }
            log::debug!("dropping transport #{}", transport.generation);
            transport.reader.abort();
        }
        // Anything the old socket still reports is stale from here on.
        self.generation += 1;
    }
    fn drop_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.reader.abort();
        }
    }
}
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}
/// Connects, hands the write half back to the session, then forwards every
/// inbound text frame until the socket closes.
async fn read_link(url: String, generation: u64, link_tx: mpsc::UnboundedSender<Link>) {
    let send = |event: LinkEvent| link_tx.send(Link { generation, event }).is_ok();
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(err) => {
            send(LinkEvent::OpenFailed(ScopeError::from(err).to_string()));
            return;
        }
    };
    let (sink, mut read) = stream.split();
    if !send(LinkEvent::Opened(sink)) {
        return;
    }
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if !send(LinkEvent::Frame(text.as_str().to_owned())) {
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                let code = frame.map_or(1005, |f| u16::from(f.code));
                send(LinkEvent::Closed(code));
                return;
            }
            Ok(Message::Binary(_)) => log::debug!("ignoring binary frame"),
            Ok(_) => {}
            Err(err) => {
                log::warn!("{}", ScopeError::from(err));
                break;
            }
        }
    }
    send(LinkEvent::Closed(CLOSE_ABNORMAL));
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use crate::drivers::connection::LinkStatus;
    use crate::drivers::protocol::InboundMessage;
    async fn next_matching(
        rx: &Receiver<ClientEvent>,
        mut pred: impl FnMut(&ClientEvent) -> bool,
    ) -> ClientEvent {
        let give_up = Instant::now() + Duration::from_secs(10);
        loop {
            while let Ok(event) = rx.try_recv() {
                if pred(&event) {
                    return event;
                }
            }
            assert!(Instant::now() < give_up, "timed out waiting for event");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    #[tokio::test]
    async fn streams_frames_answers_probes_and_honours_normal_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::text(r#"{"type":"welcome","message":"hi","clientId":1}"#))
                .await
                .unwrap();
            ws.send(Message::text("garbage")).await.unwrap();
            ws.send(Message::text(r#"{"type":"data","signal":"ECG","v":0.42}"#))
                .await
                .unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    if text.as_str() == "ping" {
                        ws.send(Message::text(r#"{"type":"pong"}"#)).await.unwrap();
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "bye".into(),
                        };
                        ws.close(Some(frame)).await.unwrap();
                        break;
                    }
                }
            }
        });
        let timings = ConnectionTimings {
            heartbeat_interval: Duration::from_millis(100),
            min_idle: Duration::ZERO,
            ..ConnectionTimings::default()
        };
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        let session = tokio::spawn(run_session(
            format!("ws://{addr}"),
            timings,
            events_tx,
            state_tx,
            cmd_rx,
        ));
        cmd_tx.send(ClientCommand::Connect).unwrap();
        next_matching(&events_rx, |e| {
            matches!(e, ClientEvent::Connection(s) if s.state == ConnectionState::Connected)
        })
        .await;
        next_matching(&events_rx, |e| {
            matches!(e, ClientEvent::Message(InboundMessage::Welcome { .. }))
        })
        .await;
        let data = next_matching(&events_rx, |e| matches!(e, ClientEvent::Message(_))).await;
        assert!(matches!(
            data,
            ClientEvent::Message(InboundMessage::Data { v: Some(v), .. }) if v == 0.42
        ));
        next_matching(&events_rx, |e| matches!(e, ClientEvent::Message(InboundMessage::Pong)))
            .await;
        let closed = next_matching(&events_rx, |e| matches!(e, ClientEvent::Connection(_))).await;
        match closed {
            ClientEvent::Connection(snapshot) => {
                assert_eq!(snapshot.state, ConnectionState::Disconnected);
                assert_eq!(snapshot.status, LinkStatus::Offline);
            }
            other => panic!("unexpected {other:?}"),
        }
        cmd_tx.send(ClientCommand::Shutdown).unwrap();
        tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
        server.await.unwrap();
    }
    #[tokio::test]
    async fn refused_connection_schedules_a_reconnect() {
        // Grab a free port, then release it so nothing listens there.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let session = tokio::spawn(run_session(
            format!("ws://{addr}"),
            ConnectionTimings::default(),
            events_tx,
            state_tx,
            cmd_rx,
        ));
        cmd_tx.send(ClientCommand::Connect).unwrap();
        let pending = next_matching(&events_rx, |e| {
            matches!(e, ClientEvent::Connection(s) if s.state == ConnectionState::ReconnectPending)
        })
        .await;
        assert!(matches!(pending, ClientEvent::Connection(s) if s.backoff_attempt == 1));
        assert_eq!(*state_rx.borrow(), ConnectionState::ReconnectPending);
        drop(cmd_tx);
        tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
    }
}
