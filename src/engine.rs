// src/engine.rs
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, watch};
use crate::config::ClientConfig;
use crate::drivers::{poll_clients, run_session, ConnectionState};
use crate::types::{ClientCommand, ClientEvent};

/// Starts the network thread: a single-threaded tokio runtime running the
/// connection session and, when configured, the client-count poll.
pub fn spawn_thread(
    config: &ClientConfig,
    tx: Sender<ClientEvent>,
    rx_cmd: mpsc::UnboundedReceiver<ClientCommand>,
) -> JoinHandle<()> {
    let url = config.url.clone();
    let timings = config.timings();
    let status_url = config.status_url.clone();
    let poll_every = config.status_poll_interval();
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                log::error!("failed to start network runtime: {err}");
                tx.send(ClientEvent::Log(format!("Network engine failed: {err}"))).ok();
                return;
            }
        };
        tx.send(ClientEvent::Log("Network engine ready.".to_owned())).ok();
        runtime.block_on(async move {
            let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
            if let Some(status_url) = status_url {
                tokio::spawn(poll_clients(status_url, poll_every, state_rx, tx.clone()));
            }
            run_session(url, timings, tx, state_tx, rx_cmd).await;
        });
        log::info!("network thread exiting");
    })
}
