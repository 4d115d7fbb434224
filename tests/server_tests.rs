//! Server Tests
//!
//! End-to-end over loopback TCP: accept, broadcast, direct sends, peer
//! close detection and shutdown.

mod common;

use std::io::{BufReader, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use common::{test_config, wait_until};
use relaykit::protocol::{read_frame, Message, Packet, PacketCodec, StringLookup, Value};
use relaykit::sender::SENDER_ROLE_NAME;
use relaykit::{Config, Connection, RelayError, Server};

// =============================================================================
// Helper Functions
// =============================================================================

fn start(config: Config) -> (Arc<Server>, JoinHandle<relaykit::Result<()>>) {
    let server = Arc::new(Server::bind(config).unwrap());
    let runner = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.run())
    };
    (server, runner)
}

fn connect(server: &Server) -> BufReader<TcpStream> {
    let stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    BufReader::new(stream)
}

fn only_connection(server: &Server) -> Arc<Connection> {
    assert!(wait_until(Duration::from_secs(5), || server.registry().len() == 1));
    let ids = server.registry().ids();
    server.registry().get(ids[0]).unwrap()
}

// =============================================================================
// Server Tests
// =============================================================================

#[test]
fn test_client_receives_broadcast_and_direct_messages() {
    let (server, runner) = start(test_config());
    let mut client = connect(&server);
    let con = only_connection(&server);

    let welcome = Message::new("welcome").with(Value::Str("lobby".to_string()));
    let direct = Message::new("direct").with(Value::U16(7));
    assert_eq!(server.registry().broadcast(&welcome).unwrap(), 1);
    con.send(direct.clone()).unwrap();
    con.send(direct.clone()).unwrap();

    let codec = PacketCodec::new(4096);
    let mut lookup = StringLookup::new();
    let mut next = || codec.decode(&read_frame(&mut client).unwrap(), &mut lookup).unwrap();
    assert_eq!(next(), welcome);
    assert_eq!(next(), direct);
    assert_eq!(next(), direct);

    server.shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn test_shutdown_closes_client_connections() {
    let (server, runner) = start(test_config());
    let mut client = connect(&server);
    let con = only_connection(&server);

    server.shutdown();
    runner.join().unwrap().unwrap();

    assert!(con.is_disposed());
    assert!(server.registry().is_empty());
    assert!(server.pool().is_shut_down());
    match read_frame(&mut client) {
        Err(RelayError::Io(e)) => assert!(
            matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset),
            "unexpected error {:?}",
            e
        ),
        other => panic!("expected a closed stream, got {:?}", other),
    }
}

#[test]
fn test_peer_close_disposes_connection() {
    let (server, runner) = start(test_config());
    let client = connect(&server);
    let con = only_connection(&server);

    drop(client);

    // The server only notices once a write fails
    assert!(wait_until(Duration::from_secs(5), || {
        let _ = con.send(Packet::blob(vec![0u8; 1024]));
        con.is_disposed()
    }));
    assert!(wait_until(Duration::from_secs(5), || server.registry().is_empty()));

    server.shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn test_connection_limit_rejects_extra_clients() {
    let (server, runner) = start(
        Config::builder()
            .listen_addr("127.0.0.1:0")
            .max_connections(1)
            .scale_interval_ms(10)
            .build(),
    );
    let _first = connect(&server);
    only_connection(&server);

    let mut second = connect(&server);
    assert!(read_frame(&mut second).is_err());
    assert_eq!(server.registry().len(), 1);

    server.shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn test_server_runs_sender_role() {
    let server = Server::bind(test_config()).unwrap();

    let stats = server.pool().stats(SENDER_ROLE_NAME).unwrap();
    assert_eq!(stats.live, 1);
    assert_ne!(server.local_addr().port(), 0);
}

#[test]
fn test_bind_rejects_invalid_config() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_packet_size(0)
        .build();
    assert!(matches!(Server::bind(config), Err(RelayError::Config(_))));
}
