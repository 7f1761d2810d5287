//! TCP accept loop and per-connection driver for the login exchange.

use crate::authenticator::{Authenticator, BeginOutcome};
use log::{debug, info, warn};
use shared::framing::{read_frame, write_frame, FrameError};
use shared::protocol::{LoginClientPacket, LoginServerPacket};
use shared::results::LoginResult;
use shared::services::{CredentialStore, SessionDirectory};
use shared::{EPHEMERAL_LENGTH, SALT_LENGTH};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

/// The login tier's network front end.
pub struct LoginServer<S, D> {
    listener: TcpListener,
    store: Arc<S>,
    directory: Arc<D>,
}

impl<S: CredentialStore, D: SessionDirectory> LoginServer<S, D> {
    pub async fn bind(
        addr: &str,
        store: Arc<S>,
        directory: Arc<D>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Login server listening on {}", addr);

        Ok(Self {
            listener,
            store,
            directory,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one task per client.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!("login connection from {}", peer);

            let store = Arc::clone(&self.store);
            let directory = Arc::clone(&self.directory);

            tokio::spawn(async move {
                let authenticator = Authenticator::new(store);
                if let Err(e) =
                    drive_login(&mut stream, peer.ip(), &authenticator, &*directory).await
                {
                    debug!("login connection from {} ended: {}", peer, e);
                }
            });
        }
    }
}

fn failed_challenge_reply(result: LoginResult) -> LoginServerPacket {
    LoginServerPacket::LogonChallengeReply {
        result,
        public_ephemeral: [0u8; EPHEMERAL_LENGTH],
        salt: [0u8; SALT_LENGTH],
        prime: [0u8; EPHEMERAL_LENGTH],
        generator: 0,
    }
}

/// Runs one complete login exchange over a connected stream.
///
/// Malformed frames and out-of-sequence packets abort without a reply; a
/// completed proof attempt is always answered, carrying the server proof
/// regardless of the outcome.
pub async fn drive_login<IO, S, D>(
    stream: &mut IO,
    peer_ip: IpAddr,
    authenticator: &Authenticator<S>,
    directory: &D,
) -> Result<(), FrameError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    S: CredentialStore,
    D: SessionDirectory,
{
    let username = match read_frame(stream).await? {
        LoginClientPacket::LogonChallenge { username } => username,
        other => {
            debug!("expected logon challenge, got {:?}", other);
            return Ok(());
        }
    };

    let exchange = match authenticator.begin_exchange(&username).await {
        BeginOutcome::Challenge(exchange) => exchange,
        BeginOutcome::AccountNotFound => {
            write_frame(
                stream,
                &failed_challenge_reply(LoginResult::FailUnknownAccount),
            )
            .await?;
            return Ok(());
        }
        BeginOutcome::StoreError => {
            write_frame(stream, &failed_challenge_reply(LoginResult::FailDbBusy)).await?;
            return Ok(());
        }
    };

    let challenge = LoginServerPacket::LogonChallengeReply {
        result: LoginResult::Success,
        public_ephemeral: exchange.public_ephemeral_wire(),
        salt: exchange.salt(),
        prime: exchange.prime_wire(),
        generator: exchange.generator(),
    };
    write_frame(stream, &challenge).await?;

    let (client_ephemeral, client_proof) = match read_frame(stream).await? {
        LoginClientPacket::LogonProof {
            public_ephemeral,
            proof,
        } => (public_ephemeral, proof),
        other => {
            debug!("expected logon proof, got {:?}", other);
            return Ok(());
        }
    };

    let outcome = exchange.verify_proof(&client_ephemeral, &client_proof);
    let mut result = outcome.result;

    if let Some(key) = outcome.session_key {
        if let Err(e) = directory.publish(&username, key).await {
            warn!("failed to publish session key for {}: {}", username, e);
            result = LoginResult::FailDbBusy;
        } else {
            authenticator.record_login(&username, peer_ip).await;
            info!("{} authenticated from {}", username, peer_ip);
        }
    } else {
        info!("{} failed authentication: {:?}", username, result);
    }

    write_frame(
        stream,
        &LoginServerPacket::LogonProofReply {
            result,
            server_proof: outcome.server_proof,
        },
    )
    .await?;

    Ok(())
}

/// Drives the client half of the exchange over a stream. Test and tooling
/// support; the real game client speaks the same frames.
pub async fn client_login<IO>(
    stream: &mut IO,
    username: &str,
    password: &str,
) -> Result<(LoginResult, Option<shared::SessionKey>), FrameError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    use shared::srp::{ephemeral_from_wire, ephemeral_to_wire, SrpClient};

    write_frame(
        stream,
        &LoginClientPacket::LogonChallenge {
            username: username.to_string(),
        },
    )
    .await?;

    let (result, public_ephemeral, salt) = match read_frame(stream).await? {
        LoginServerPacket::LogonChallengeReply {
            result,
            public_ephemeral,
            salt,
            ..
        } => (result, public_ephemeral, salt),
        other => {
            debug!("unexpected reply to challenge: {:?}", other);
            return Ok((LoginResult::FailDbBusy, None));
        }
    };

    if result != LoginResult::Success {
        return Ok((result, None));
    }

    let client = SrpClient::new(username, password);
    let server_public = ephemeral_from_wire(&public_ephemeral);
    let (session_key, proof) = client.process_challenge(&salt, &server_public);

    write_frame(
        stream,
        &LoginClientPacket::LogonProof {
            public_ephemeral: ephemeral_to_wire(client.public_ephemeral()),
            proof,
        },
    )
    .await?;

    match read_frame(stream).await? {
        LoginServerPacket::LogonProofReply { result, .. } => {
            let key = (result == LoginResult::Success).then_some(session_key);
            Ok((result, key))
        }
        other => {
            debug!("unexpected reply to proof: {:?}", other);
            Ok((LoginResult::FailDbBusy, None))
        }
    }
}
