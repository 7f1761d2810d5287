//! Per-connection lifecycle state machine.
//!
//! Each connection is logically single-threaded: the owning task feeds this
//! machine one packet or event at a time, so handlers run to completion
//! before the next input is considered. The only suspension points are the
//! session key directory lookup and the admission-queue wait, both of which
//! come back as [`SessionEvent`]s on the connection's own event channel.

use crate::patch::{PatchLevel, PatchState};
use crate::queue::RealmQueue;
use crate::session_proof::verify_session_proof;
use log::{debug, info, warn};
use shared::protocol::{ClientPacket, ServerPacket};
use shared::results::ResponseCode;
use shared::services::{CharacterService, DirectoryError, SessionDirectory};
use shared::{SessionKey, PROOF_LENGTH};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle states of a gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Waiting for the session-auth packet.
    Authenticating,
    /// Session-auth received, directory lookup outstanding. Re-submission is
    /// rejected here so at most one lookup is ever in flight.
    AuthenticatingRemoteWait,
    InQueue,
    CharacterList,
    InWorld,
    Closed,
}

/// Asynchronous completions re-dispatched onto the connection's own
/// execution context before they may touch session state.
#[derive(Debug)]
pub enum SessionEvent {
    DirectoryReply(Result<SessionKey, DirectoryError>),
    QueueAdmitted,
    QueuePositionChanged(u32),
}

struct PendingAuth {
    username: String,
    client_seed: u32,
    digest: [u8; PROOF_LENGTH],
}

/// One connection's session. Collaborators are injected so tests can run the
/// machine against fakes without sockets.
pub struct Session<D, C> {
    id: u64,
    state: ClientState,
    account_name: Option<String>,
    server_seed: u32,
    latency: u32,
    pending_auth: Option<PendingAuth>,
    finished: bool,
    outbound: UnboundedSender<ServerPacket>,
    events: UnboundedSender<SessionEvent>,
    directory: Arc<D>,
    characters: Arc<C>,
    queue: Arc<RealmQueue>,
    patch_level: PatchLevel,
    directory_timeout: Duration,
}

impl<D: SessionDirectory, C: CharacterService> Session<D, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        server_seed: u32,
        outbound: UnboundedSender<ServerPacket>,
        events: UnboundedSender<SessionEvent>,
        directory: Arc<D>,
        characters: Arc<C>,
        queue: Arc<RealmQueue>,
        patch_level: PatchLevel,
        directory_timeout: Duration,
    ) -> Self {
        Self {
            id,
            state: ClientState::Authenticating,
            account_name: None,
            server_seed,
            latency: 0,
            pending_auth: None,
            finished: false,
            outbound,
            events,
            directory,
            characters,
            queue,
            patch_level,
            directory_timeout,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }

    /// Kicks off the handshake by challenging the client with our seed.
    pub fn begin(&self) {
        self.send(ServerPacket::AuthChallenge {
            seed: self.server_seed,
        });
    }

    /// Routes one inbound packet by (state, opcode).
    ///
    /// Ping and keep-alive are universal. Everything else is strict during
    /// authentication (a wrong packet closes the connection) and lenient
    /// afterwards (unexpected packets are ignored).
    pub async fn handle_packet(&mut self, packet: ClientPacket) {
        match packet {
            ClientPacket::Ping { sequence, latency } => {
                self.latency = latency;
                self.send(ServerPacket::Pong { sequence });
                return;
            }
            ClientPacket::KeepAlive => return, // no response required
            _ => {}
        }

        match self.state {
            ClientState::Authenticating => self.handle_authentication(packet),
            ClientState::AuthenticatingRemoteWait => {
                debug!(
                    "connection {}: packet dropped while awaiting directory reply",
                    self.id
                );
            }
            ClientState::CharacterList => self.handle_character_list(packet).await,
            ClientState::InQueue | ClientState::InWorld | ClientState::Closed => {}
        }
    }

    /// Handles a re-dispatched asynchronous completion.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::DirectoryReply(result) => self.handle_directory_reply(result),
            SessionEvent::QueueAdmitted => {
                if self.state == ClientState::InQueue {
                    self.queue.confirm_admission(self.id);
                    self.auth_success();
                }
            }
            SessionEvent::QueuePositionChanged(position) => {
                if self.state == ClientState::InQueue {
                    self.send(ServerPacket::QueuePosition { position });
                }
            }
        }
    }

    fn handle_authentication(&mut self, packet: ClientPacket) {
        // moved before the opcode check so a second authentication packet
        // cannot start a second lookup
        self.state = ClientState::AuthenticatingRemoteWait;

        let ClientPacket::AuthSession {
            build,
            username,
            seed,
            digest,
        } = packet
        else {
            debug!(
                "connection {}: expected session-auth packet, closing",
                self.id
            );
            self.close();
            return;
        };

        if self.patch_level.check(build) != PatchState::Ok {
            info!(
                "connection {}: rejecting {} on unsupported build {}",
                self.id, username, build
            );
            self.send_auth_fail(ResponseCode::AuthReject);
            return;
        }

        debug!(
            "connection {}: session proof from {} (build {})",
            self.id, username, build
        );

        self.pending_auth = Some(PendingAuth {
            username: username.clone(),
            client_seed: seed,
            digest,
        });

        let directory = Arc::clone(&self.directory);
        let events = self.events.clone();
        let timeout = self.directory_timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, directory.locate(&username)).await {
                Ok(result) => result,
                Err(_) => Err(DirectoryError::Unavailable("lookup timed out".to_string())),
            };
            // a send failure means the connection is gone; the reply is
            // safely discarded
            let _ = events.send(SessionEvent::DirectoryReply(result));
        });
    }

    fn handle_directory_reply(&mut self, result: Result<SessionKey, DirectoryError>) {
        if self.state != ClientState::AuthenticatingRemoteWait {
            debug!("connection {}: stale directory reply discarded", self.id);
            return;
        }

        let Some(pending) = self.pending_auth.take() else {
            warn!("connection {}: directory reply without pending auth", self.id);
            self.close();
            return;
        };

        match result {
            Ok(key) => self.prove_session(&key, pending),
            Err(DirectoryError::AlreadyLoggedIn) => {
                self.send_auth_fail(ResponseCode::AuthAlreadyOnline)
            }
            Err(DirectoryError::NotFound) => self.send_auth_fail(ResponseCode::AuthUnknownAccount),
            Err(DirectoryError::Unavailable(reason)) => {
                // internal detail stays internal; the client sees a generic error
                warn!("connection {}: directory error: {}", self.id, reason);
                self.send_auth_fail(ResponseCode::AuthSystemError);
            }
        }
    }

    fn prove_session(&mut self, key: &SessionKey, pending: PendingAuth) {
        if !verify_session_proof(
            key,
            &pending.username,
            pending.client_seed,
            self.server_seed,
            &pending.digest,
        ) {
            self.send_auth_fail(ResponseCode::AuthBadServerProof);
            return;
        }

        info!(
            "connection {}: {} proved session key possession",
            self.id, pending.username
        );
        self.account_name = Some(pending.username);

        if self.queue.try_admit() {
            self.auth_success();
        } else {
            self.state = ClientState::InQueue;
            let position = self.queue.enqueue(self.id, self.events.clone());
            self.send(ServerPacket::AuthResponse {
                result: ResponseCode::AuthWaitQueue,
            });
            self.send(ServerPacket::QueuePosition {
                position: position as u32,
            });
        }
    }

    fn auth_success(&mut self) {
        self.state = ClientState::CharacterList;
        self.send(ServerPacket::AuthResponse {
            result: ResponseCode::AuthOk,
        });
    }

    fn send_auth_fail(&mut self, result: ResponseCode) {
        // the client always gets a response before the socket goes away
        self.send(ServerPacket::AuthResponse { result });
        self.close();
    }

    async fn handle_character_list(&mut self, packet: ClientPacket) {
        let Some(account) = self.account_name.clone() else {
            self.close();
            return;
        };

        match packet {
            ClientPacket::CharEnum => match self.characters.list(&account).await {
                Ok(characters) => self.send(ServerPacket::CharEnumReply { characters }),
                Err(e) => {
                    warn!("connection {}: character list failed: {}", self.id, e);
                    self.send(ServerPacket::AuthResponse {
                        result: ResponseCode::AuthUnavailable,
                    });
                }
            },
            ClientPacket::CharCreate { name } => {
                let result = match self.characters.create(&account, &name).await {
                    Ok(_) => ResponseCode::CharCreateSuccess,
                    Err(e) => {
                        warn!("connection {}: character create failed: {}", self.id, e);
                        ResponseCode::CharCreateFailed
                    }
                };
                self.send(ServerPacket::CharCreateReply { result });
            }
            ClientPacket::CharDelete { id } => {
                let result = match self.characters.delete(&account, id).await {
                    Ok(()) => ResponseCode::CharDeleteSuccess,
                    Err(_) => ResponseCode::CharDeleteFailed,
                };
                self.send(ServerPacket::CharDeleteReply { result });
            }
            ClientPacket::PlayerLogin { id } => {
                // entering the world is handled by the world tier; the
                // session stays on the character list until handoff
                debug!("connection {}: world entry requested for {}", self.id, id);
            }
            other => {
                debug!(
                    "connection {}: ignoring {:?} on character list",
                    self.id, other
                );
            }
        }
    }

    fn send(&self, packet: ServerPacket) {
        // the writer half may already be gone during teardown
        let _ = self.outbound.send(packet);
    }

    fn close(&mut self) {
        self.finish();
    }
}

impl<D, C> Session<D, C> {
    /// Tears the session down, reporting to the admission service exactly
    /// once: a waiting connection is dequeued (returning any slot already
    /// transferred to it), an admitted one releases its world slot. Runs on
    /// every exit path; later calls are no-ops.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        match self.state {
            ClientState::CharacterList | ClientState::InWorld => self.queue.decrement(),
            ClientState::InQueue => self.queue.dequeue(self.id),
            _ => {}
        }

        self.state = ClientState::Closed;
    }
}

impl<D, C> Drop for Session<D, C> {
    fn drop(&mut self) {
        self.finish();
    }
}
