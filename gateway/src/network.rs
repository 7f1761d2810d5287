//! Gateway network layer: accept loop and per-connection tasks.
//!
//! Each accepted connection gets its own task owning the socket, the
//! session state machine and an event channel. Inbound frames and
//! asynchronous completions (directory replies, queue admissions) are
//! multiplexed onto that single task, which gives every session the
//! serialized execution the state machine relies on.

use crate::patch::PatchLevel;
use crate::queue::RealmQueue;
use crate::session::{ClientState, Session, SessionEvent};
use log::{debug, error, info};
use rand::Rng;
use shared::framing::{read_frame, write_frame, FrameError};
use shared::protocol::{ClientPacket, ServerPacket};
use shared::services::{CharacterService, SessionDirectory};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Tunables for the gateway tier.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Maximum connections admitted into the world; 0 means unlimited.
    pub world_capacity: usize,
    /// Client builds accepted at authentication; empty accepts any.
    pub allowed_builds: Vec<u32>,
    /// Budget for one session key directory round-trip.
    pub directory_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            world_capacity: 0,
            allowed_builds: Vec::new(),
            directory_timeout: Duration::from_secs(10),
        }
    }
}

/// The gateway's network front end.
pub struct GatewayServer<D, C> {
    listener: TcpListener,
    directory: Arc<D>,
    characters: Arc<C>,
    queue: Arc<RealmQueue>,
    config: GatewayConfig,
    next_connection_id: AtomicU64,
}

impl<D: SessionDirectory, C: CharacterService> GatewayServer<D, C> {
    pub async fn bind(
        addr: &str,
        directory: Arc<D>,
        characters: Arc<C>,
        config: GatewayConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Gateway listening on {}", addr);

        Ok(Self {
            listener,
            directory,
            characters,
            queue: Arc::new(RealmQueue::new(config.world_capacity)),
            config,
            next_connection_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one session task per client.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
            info!("connection {} from {}", id, peer);

            let directory = Arc::clone(&self.directory);
            let characters = Arc::clone(&self.characters);
            let queue = Arc::clone(&self.queue);
            let patch_level = PatchLevel::new(self.config.allowed_builds.clone());
            let timeout = self.config.directory_timeout;

            tokio::spawn(async move {
                drive_connection(stream, id, directory, characters, queue, patch_level, timeout)
                    .await;
                info!("connection {} closed", id);
            });
        }
    }
}

/// Runs one connection to completion. Session teardown (queue accounting)
/// happens on every exit path, including errors.
pub async fn drive_connection<IO, D, C>(
    stream: IO,
    id: u64,
    directory: Arc<D>,
    characters: Arc<C>,
    queue: Arc<RealmQueue>,
    patch_level: PatchLevel,
    directory_timeout: Duration,
) where
    IO: AsyncRead + AsyncWrite + Send + 'static,
    D: SessionDirectory,
    C: CharacterService,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerPacket>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (packet_tx, mut packet_rx) = mpsc::unbounded_channel::<Result<ClientPacket, FrameError>>();

    // writer half: drains the outbound queue until the session is gone
    let writer_task = tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &packet).await {
                error!("connection {}: send failed: {}", id, e);
                break;
            }
        }
    });

    // reader half: frames arrive on a channel so the select below only ever
    // suspends on cancel-safe channel receives
    let reader_task = tokio::spawn(async move {
        loop {
            match read_frame::<_, ClientPacket>(&mut reader).await {
                Ok(packet) => {
                    if packet_tx.send(Ok(packet)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = packet_tx.send(Err(e));
                    break;
                }
            }
        }
    });

    let server_seed: u32 = rand::thread_rng().gen();
    let mut session = Session::new(
        id,
        server_seed,
        outbound_tx,
        event_tx,
        directory,
        characters,
        queue,
        patch_level,
        directory_timeout,
    );
    session.begin();

    loop {
        tokio::select! {
            frame = packet_rx.recv() => {
                match frame {
                    Some(Ok(packet)) => session.handle_packet(packet).await,
                    Some(Err(FrameError::Closed)) => {
                        debug!("connection {}: peer disconnected", id);
                        break;
                    }
                    Some(Err(e)) => {
                        // malformed input is never partially acted upon
                        debug!("connection {}: dropping, {}", id, e);
                        break;
                    }
                    None => break,
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(event) => session.handle_event(event).await,
                    None => break,
                }
            }
        }

        if session.state() == ClientState::Closed {
            break;
        }
    }

    session.finish();
    drop(session); // closes the outbound channel so the writer drains and stops
    reader_task.abort();
    let _ = writer_task.await;
}
