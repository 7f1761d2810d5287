//! Integration tests for the login and gateway tiers.
//!
//! These tests run both tiers against one shared session key directory and
//! drive the real wire protocol over TCP, the way a game client would.

use gateway::network::{GatewayConfig, GatewayServer};
use gateway::session_proof::compute_session_digest;
use login::network::{client_login, LoginServer};
use shared::framing::{read_frame, write_frame, FrameError};
use shared::protocol::{ClientPacket, ServerPacket};
use shared::results::{LoginResult, ResponseCode};
use shared::services::{MemoryCharacterService, MemoryCredentialStore, MemoryDirectory};
use shared::SessionKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

struct Realm {
    store: Arc<MemoryCredentialStore>,
    login_addr: std::net::SocketAddr,
    gateway_addr: std::net::SocketAddr,
}

/// Boots both tiers on ephemeral ports around a shared directory.
async fn start_realm(world_capacity: usize) -> Realm {
    let store = Arc::new(MemoryCredentialStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let characters = Arc::new(MemoryCharacterService::new());

    let login_server = LoginServer::bind("127.0.0.1:0", Arc::clone(&store), Arc::clone(&directory))
        .await
        .expect("login bind");
    let login_addr = login_server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = login_server.run().await;
    });

    let config = GatewayConfig {
        world_capacity,
        directory_timeout: Duration::from_secs(5),
        ..GatewayConfig::default()
    };
    let gateway_server = GatewayServer::bind("127.0.0.1:0", directory, characters, config)
        .await
        .expect("gateway bind");
    let gateway_addr = gateway_server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = gateway_server.run().await;
    });

    Realm {
        store,
        login_addr,
        gateway_addr,
    }
}

async fn login_exchange(realm: &Realm, username: &str, password: &str) -> (LoginResult, Option<SessionKey>) {
    let mut stream = TcpStream::connect(realm.login_addr).await.expect("connect login");
    client_login(&mut stream, username, password)
        .await
        .expect("login exchange")
}

/// Connects to the gateway and answers the challenge with the given key.
async fn gateway_auth(
    realm: &Realm,
    username: &str,
    key: &SessionKey,
) -> (TcpStream, ResponseCode) {
    let mut stream = TcpStream::connect(realm.gateway_addr)
        .await
        .expect("connect gateway");

    let server_seed = match read_frame(&mut stream).await.expect("challenge") {
        ServerPacket::AuthChallenge { seed } => seed,
        other => panic!("expected auth challenge, got {:?}", other),
    };

    let client_seed = 0x0158A2B3;
    let digest = compute_session_digest(key, username, client_seed, server_seed);
    write_frame(
        &mut stream,
        &ClientPacket::AuthSession {
            build: 5875,
            username: username.to_string(),
            seed: client_seed,
            digest,
        },
    )
    .await
    .expect("send auth session");

    let result = match read_frame(&mut stream).await.expect("auth response") {
        ServerPacket::AuthResponse { result } => result,
        other => panic!("expected auth response, got {:?}", other),
    };

    (stream, result)
}

async fn assert_closed(stream: &mut TcpStream) {
    let next: Result<ServerPacket, _> = read_frame(stream).await;
    assert!(
        matches!(next, Err(FrameError::Closed)),
        "expected the gateway to close the connection"
    );
}

/// FULL HANDSHAKE SCENARIOS
mod handshake_tests {
    use super::*;

    /// Correct password end to end: password exchange, then session proof,
    /// then live character traffic.
    #[tokio::test]
    async fn correct_password_reaches_character_list() {
        let realm = start_realm(0).await;
        realm.store.register("TESTUSER", "password").await;

        let (result, key) = login_exchange(&realm, "TESTUSER", "password").await;
        assert_eq!(result, LoginResult::Success);
        let key = key.expect("session key on success");

        let (mut stream, result) = gateway_auth(&realm, "TESTUSER", &key).await;
        assert_eq!(result, ResponseCode::AuthOk);

        write_frame(&mut stream, &ClientPacket::CharCreate { name: "Jaina".into() })
            .await
            .unwrap();
        match read_frame(&mut stream).await.unwrap() {
            ServerPacket::CharCreateReply { result } => {
                assert_eq!(result, ResponseCode::CharCreateSuccess)
            }
            other => panic!("expected char create reply, got {:?}", other),
        }

        write_frame(&mut stream, &ClientPacket::CharEnum).await.unwrap();
        match read_frame(&mut stream).await.unwrap() {
            ServerPacket::CharEnumReply { characters } => {
                assert_eq!(characters.len(), 1);
                assert_eq!(characters[0].name, "Jaina");
            }
            other => panic!("expected character list, got {:?}", other),
        }
    }

    /// A session the directory has never seen maps to the unknown-account
    /// code, then the connection closes.
    #[tokio::test]
    async fn missing_session_key_is_unknown_account() {
        let realm = start_realm(0).await;

        let fake_key = SessionKey([0x11; shared::SESSION_KEY_LENGTH]);
        let (mut stream, result) = gateway_auth(&realm, "GHOST", &fake_key).await;
        assert_eq!(result, ResponseCode::AuthUnknownAccount);
        assert_closed(&mut stream).await;
    }

    /// A second gateway connection for a live session reports already-online.
    #[tokio::test]
    async fn second_connection_is_already_online() {
        let realm = start_realm(0).await;
        realm.store.register("TESTUSER", "password").await;

        let (_, key) = login_exchange(&realm, "TESTUSER", "password").await;
        let key = key.unwrap();

        let (_live, result) = gateway_auth(&realm, "TESTUSER", &key).await;
        assert_eq!(result, ResponseCode::AuthOk);

        let (mut stream, result) = gateway_auth(&realm, "TESTUSER", &key).await;
        assert_eq!(result, ResponseCode::AuthAlreadyOnline);
        assert_closed(&mut stream).await;
    }

    /// A banned account passes the math but fails the status gate; the
    /// server proof still comes back.
    #[tokio::test]
    async fn banned_account_fails_with_banned_code() {
        let realm = start_realm(0).await;
        realm.store.register("TESTUSER", "password").await;
        realm.store.set_banned("TESTUSER", true).await;

        let (result, key) = login_exchange(&realm, "TESTUSER", "password").await;
        assert_eq!(result, LoginResult::FailBanned);
        assert!(key.is_none());
    }

    /// Wrong password: proof reply arrives with the failure code and no
    /// session key becomes usable at the gateway.
    #[tokio::test]
    async fn wrong_password_yields_no_usable_session() {
        let realm = start_realm(0).await;
        realm.store.register("TESTUSER", "password").await;

        let (result, key) = login_exchange(&realm, "TESTUSER", "letmein").await;
        assert_eq!(result, LoginResult::FailIncorrectPassword);
        assert!(key.is_none());

        let fake_key = SessionKey([0x22; shared::SESSION_KEY_LENGTH]);
        let (mut stream, result) = gateway_auth(&realm, "TESTUSER", &fake_key).await;
        assert_eq!(result, ResponseCode::AuthUnknownAccount);
        assert_closed(&mut stream).await;
    }
}

/// SESSION LIFECYCLE SCENARIOS
mod lifecycle_tests {
    use super::*;

    /// With a single world slot, the second authenticated connection waits
    /// in the queue and is admitted when the first disconnects.
    #[tokio::test]
    async fn queue_admits_after_slot_frees() {
        let realm = start_realm(1).await;
        realm.store.register("FIRST", "password").await;
        realm.store.register("SECOND", "password").await;

        let (_, first_key) = login_exchange(&realm, "FIRST", "password").await;
        let (first_stream, result) = gateway_auth(&realm, "FIRST", &first_key.unwrap()).await;
        assert_eq!(result, ResponseCode::AuthOk);

        let (_, second_key) = login_exchange(&realm, "SECOND", "password").await;
        let (mut second_stream, result) =
            gateway_auth(&realm, "SECOND", &second_key.unwrap()).await;
        assert_eq!(result, ResponseCode::AuthWaitQueue);

        match read_frame(&mut second_stream).await.unwrap() {
            ServerPacket::QueuePosition { position } => assert_eq!(position, 1),
            other => panic!("expected queue position, got {:?}", other),
        }

        // first connection leaves; its slot goes to the waiter
        drop(first_stream);

        match read_frame(&mut second_stream).await.unwrap() {
            ServerPacket::AuthResponse { result } => assert_eq!(result, ResponseCode::AuthOk),
            other => panic!("expected admission, got {:?}", other),
        }
    }

    /// Ping round-trips echo the sequence number in every state.
    #[tokio::test]
    async fn ping_echoes_before_authentication() {
        let realm = start_realm(0).await;

        let mut stream = TcpStream::connect(realm.gateway_addr).await.unwrap();
        let _challenge: ServerPacket = read_frame(&mut stream).await.unwrap();

        write_frame(
            &mut stream,
            &ClientPacket::Ping {
                sequence: 41,
                latency: 15,
            },
        )
        .await
        .unwrap();

        match read_frame(&mut stream).await.unwrap() {
            ServerPacket::Pong { sequence } => assert_eq!(sequence, 41),
            other => panic!("expected pong, got {:?}", other),
        }
    }

    /// A garbage frame during authentication drops the connection with no
    /// reply.
    #[tokio::test]
    async fn malformed_frame_closes_the_connection() {
        use tokio::io::AsyncWriteExt;

        let realm = start_realm(0).await;

        let mut stream = TcpStream::connect(realm.gateway_addr).await.unwrap();
        let _challenge: ServerPacket = read_frame(&mut stream).await.unwrap();

        // valid length prefix, undecodable payload
        stream.write_all(&4u16.to_be_bytes()).await.unwrap();
        stream.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap();
        stream.flush().await.unwrap();

        assert_closed(&mut stream).await;
    }
}
