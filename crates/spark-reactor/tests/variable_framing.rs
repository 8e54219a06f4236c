//! A selector configured with a non-default framing strategy (spec §4.5).

mod common;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use common::EchoEvents;
use spark_core::config::{PacketWorkerConfig, SelectorConfig, SocketOptions, TimeoutConfig};
use spark_framing::VariableLengthFraming;
use spark_reactor::{ListenerSecurity, Selector};
use spark_transport_tls::Delegation;

fn encode(header: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut wire = header.to_vec();
    wire.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    wire.extend_from_slice(payload);
    wire
}

#[test]
fn variable_length_framing_round_trips_over_the_reactor() {
    let mut selector = Selector::new(
        SelectorConfig::default(),
        SocketOptions::default(),
        PacketWorkerConfig::default(),
        TimeoutConfig::default(),
        Delegation::InThread,
    )
    .unwrap()
    .with_framing(|| Box::new(VariableLengthFraming::new(2, 2)));

    let listener = selector.add_listener("127.0.0.1:0".parse().unwrap(), ListenerSecurity::Plain).unwrap();
    let addr = selector.listener_addr(listener).unwrap();
    let stop = selector.stop_handle();

    let handle = thread::spawn(move || {
        let mut events = EchoEvents::default();
        selector.run(&mut events).unwrap();
    });

    thread::sleep(Duration::from_millis(50));

    let mut client = TcpStream::connect(addr).unwrap();
    let header = [0xAB, 0xCD];
    let payload = b"variable-length payload";
    let wire = encode(&header, payload);

    // Write it split across several small chunks to exercise reassembly.
    for chunk in wire.chunks(4) {
        client.write_all(chunk).unwrap();
        thread::sleep(Duration::from_millis(5));
    }

    // `EchoEvents` re-wraps with `SimpleFraming`'s one-byte prefix
    // regardless of the inbound framing strategy, since it has no way to
    // know the outbound header a caller might want — so expect that shape
    // back. The reassembled frame itself is the original header followed
    // by the payload (the wire's length field is stripped, not the header).
    let mut expected_frame = header.to_vec();
    expected_frame.extend_from_slice(payload);

    let mut echoed = vec![0u8; 1 + expected_frame.len()];
    client.read_exact(&mut echoed).unwrap();
    assert_eq!(echoed[0] as usize, expected_frame.len());
    assert_eq!(&echoed[1..], &expected_frame[..]);

    stop.request_stop();
    handle.join().unwrap();
}
