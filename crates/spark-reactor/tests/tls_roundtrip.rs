//! TLS handshake completion and application-data exchange, driven entirely
//! through the reactor rather than by hand (spec §8, cf.
//! `spark-transport-tls`'s own lower-level loopback test).

mod common;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use common::{self_signed_configs, EchoEvents, RecordedEvent, RecordingEvents};
use rustls_pki_types::ServerName;
use spark_core::config::{PacketWorkerConfig, SelectorConfig, SocketOptions, TimeoutConfig};
use spark_reactor::{Client, ClientSecurity, ListenerSecurity, Server};
use spark_transport_tls::Delegation;

#[test]
fn tls_handshake_completes_and_echoes_over_the_reactor() {
    let (server_config, client_config) = self_signed_configs();

    let server = Server::bind(
        "127.0.0.1:0".parse().unwrap(),
        ListenerSecurity::Secure(server_config),
        SelectorConfig::default(),
        SocketOptions::default(),
        PacketWorkerConfig::default(),
        TimeoutConfig::default(),
        Delegation::InThread,
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    let server_stop = server.stop_handle();

    let server_handle = thread::spawn(move || {
        let mut server = server;
        let mut events = EchoEvents::default();
        server.run(&mut events).unwrap();
    });

    let server_name = ServerName::try_from("localhost").unwrap().to_owned();
    let mut client = Client::connect(
        addr,
        ClientSecurity::Secure {
            config: client_config,
            server_name,
        },
        SelectorConfig::default(),
        SocketOptions::default(),
        PacketWorkerConfig::default(),
        TimeoutConfig::default(),
        Delegation::OffThread,
    )
    .unwrap();
    let client_stop = client.stop_handle();

    let (tx, rx) = mpsc::channel();
    let client_handle = thread::spawn(move || {
        let mut events = RecordingEvents::new(tx, Some(b"ping".to_vec()));
        client.run(&mut events).unwrap();
    });

    let ready = rx.recv_timeout(Duration::from_secs(5)).expect("handshake should complete");
    assert!(matches!(ready, RecordedEvent::Ready(_)));

    let frame = rx.recv_timeout(Duration::from_secs(5)).expect("echo should arrive");
    match frame {
        RecordedEvent::Frame(_, bytes) => assert_eq!(&bytes[..], b"ping"),
        other => panic!("expected a frame, got {other:?}"),
    }

    client_stop.request_stop();
    server_stop.request_stop();
    client_handle.join().unwrap();
    server_handle.join().unwrap();
}
