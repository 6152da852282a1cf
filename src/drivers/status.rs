use std::sync::mpsc::Sender;
use std::time::Duration;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use crate::drivers::connection::ConnectionState;
use crate::drivers::ScopeError;
use crate::types::ClientEvent;
#[derive(Debug, Deserialize)]
struct StatusReply {
    clients: u32,
}
/// One GET of the device's status endpoint.
pub async fn fetch_clients(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<u32, ScopeError> {
    let reply: StatusReply = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(reply.clients)
}
/// Polls the connected-client count while the link is up.
///
/// Failures only reach the debug log. Exits when the session drops its
/// state channel or the GUI stops listening.
pub async fn poll_clients(
    url: String,
    every: Duration,
    state: watch::Receiver<ConnectionState>,
    events: Sender<ClientEvent>,
) {
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if state.has_changed().is_err() {
            break;
        }
        if *state.borrow() != ConnectionState::Connected {
            continue;
        }
        match fetch_clients(&client, &url, every).await {
            Ok(count) => {
                if events.send(ClientEvent::Clients(count)).is_err() {
                    break;
                }
            }
            Err(err) => log::debug!("status poll failed: {err}"),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    async fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/api/status")
    }
    #[tokio::test]
    async fn reads_client_count() {
        let url = serve_once(r#"{"clients":3,"uptime":12}"#).await;
        let count = fetch_clients(&reqwest::Client::new(), &url, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(count, 3);
    }
    #[tokio::test]
    async fn malformed_reply_is_an_error() {
        let url = serve_once(r#"{"nope":true}"#).await;
        let result = fetch_clients(&reqwest::Client::new(), &url, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(ScopeError::Status(_))));
    }
    #[tokio::test]
    async fn poller_stays_quiet_until_connected_and_stops_with_session() {
        let url = serve_once(r#"{"clients":2}"#).await;
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let poller = tokio::spawn(poll_clients(
            url,
            Duration::from_millis(20),
            state_rx,
            events_tx,
        ));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(events_rx.try_recv().is_err());
        state_tx.send_replace(ConnectionState::Connected);
        let mut seen = None;
        for _ in 0..200 {
            if let Ok(event) = events_rx.try_recv() {
                seen = Some(event);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(seen, Some(ClientEvent::Clients(2))));
        drop(state_tx);
        tokio::time::timeout(Duration::from_secs(2), poller)
            .await
            .unwrap()
            .unwrap();
    }
}
