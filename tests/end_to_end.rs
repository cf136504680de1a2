//! End-to-end properties of the transport over loopback TCP.
//!
//! Verifies that:
//! - payloads of every interesting size arrive intact
//! - compressible payloads travel compressed and tiny random ones do not
//! - an announced payload above the receive ceiling terminates the link
//! - a connection with an error performs no further I/O
//! - cancellation reaches the master and every duplicate
//! - a bandwidth limit keeps ten 100 kB sends from finishing in under a second
//! - close is idempotent and shuts the socket down once

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bnet::bsock::{PeerIdentity, Transport};
use bnet::logging::{CollectingSink, MessageType};
use bnet::protocol::{COMPRESSED_BIT, HDR_EXTEND_BIT};
use bnet::{Bsock, BsockError, BsockOptions, RecvResult, Signal};

// ============================================================================
// Fixtures
// ============================================================================

fn listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    (listener, addr)
}

fn bsock_pair(options: BsockOptions) -> (Bsock, Bsock) {
    let (listener, addr) = listener();
    let client = TcpStream::connect(addr).expect("connect");
    let (server, _) = listener.accept().expect("accept");
    (
        Bsock::from_stream(client, "sd", options.clone()).expect("client"),
        Bsock::from_stream(server, "fd", options).expect("server"),
    )
}

/// A transport that fails every write and counts the attempts.
#[derive(Clone, Default)]
struct Counting {
    writes: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
    fail_writes: bool,
}

impl Read for Counting {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

impl Write for Counting {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        } else {
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for Counting {
    fn set_read_timeout(&self, _: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn set_write_timeout(&self, _: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn shutdown(&self, _: Shutdown) -> io::Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 9103)))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    fn set_nonblocking(&self, _: bool) -> io::Result<()> {
        Ok(())
    }
}

fn counting_bsock(transport: Counting, options: BsockOptions) -> Bsock {
    Bsock::from_transport(
        Box::new(transport),
        PeerIdentity::new("Storage daemon", "127.0.0.1", 9103),
        options,
    )
}

// ============================================================================
// Payload sizes and compression
// ============================================================================

#[test]
fn every_size_round_trips() {
    let sizes = [0usize, 1, 19, 20, 21, 65_536, 999_999, 1_000_000];
    let (mut a, mut b) = bsock_pair(BsockOptions::new().compression(true));

    let receiver = thread::spawn(move || {
        let mut seen = Vec::new();
        loop {
            match b.recv() {
                RecvResult::Data(n) => seen.push((n, b.msg().to_vec())),
                RecvResult::Signal(Signal::EndOfData) => break,
                other => panic!("unexpected {other:?}"),
            }
        }
        seen
    });

    for &size in &sizes {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        a.set_msg(&payload);
        a.send().expect("send");
    }
    a.signal(Signal::EndOfData).expect("eod");

    let seen = receiver.join().expect("receiver");
    assert_eq!(seen.len(), sizes.len());
    for ((len, payload), &size) in seen.iter().zip(&sizes) {
        assert_eq!(*len, size);
        assert!(payload.iter().enumerate().all(|(i, &b)| b == (i % 251) as u8));
    }
}

#[test]
fn compressible_payload_sets_compressed_bit() {
    let (listener, addr) = listener();
    let client = TcpStream::connect(addr).expect("connect");
    let (mut raw, _) = listener.accept().expect("accept");
    let mut a =
        Bsock::from_stream(client, "sd", BsockOptions::new().compression(true)).expect("bsock");

    a.set_msg(&b"0123456789".repeat(1_000));
    a.send().expect("send");

    let mut header = [0u8; 4];
    raw.read_exact(&mut header).expect("header");
    let word = i32::from_be_bytes(header);
    assert_ne!(word & COMPRESSED_BIT, 0);
    let len = (word & !(COMPRESSED_BIT | HDR_EXTEND_BIT)) as usize;
    assert!(len < 10_000, "wire length {len}");

    let stats = a.compression_stats();
    assert_eq!(stats.comm_bytes, 10_000);
    assert_eq!(stats.comm_compressed_bytes, len as u64);
}

#[test]
fn tiny_random_payload_goes_uncompressed() {
    let (listener, addr) = listener();
    let client = TcpStream::connect(addr).expect("connect");
    let (mut raw, _) = listener.accept().expect("accept");
    let mut a =
        Bsock::from_stream(client, "sd", BsockOptions::new().compression(true)).expect("bsock");

    let payload = [
        0x9c, 0x3f, 0xd2, 0x11, 0x7a, 0xe4, 0x05, 0xb8, 0x66, 0xc1, 0x2d, 0x90, 0x4e, 0xfa, 0x37,
        0x08, 0xab, 0x59, 0xe0, 0x13, 0x72,
    ];
    a.set_msg(&payload);
    a.send().expect("send");

    let mut frame = [0u8; 25];
    raw.read_exact(&mut frame).expect("frame");
    assert_eq!(i32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]), 21);
    assert_eq!(&frame[4..], &payload);
    let stats = a.compression_stats();
    assert_eq!(stats.comm_bytes, stats.comm_compressed_bytes);
}

// ============================================================================
// Protocol violations and error handling
// ============================================================================

#[test]
fn oversized_announcement_terminates() {
    let (listener, addr) = listener();
    let mut raw = TcpStream::connect(addr).expect("connect");
    let (server, _) = listener.accept().expect("accept");
    let sink = CollectingSink::shared();
    let mut b = Bsock::from_stream(server, "fd", BsockOptions::new().sink(sink.clone()))
        .expect("bsock");

    raw.write_all(&1_000_001i32.to_be_bytes()).expect("header");
    raw.write_all(b"payload that must not be read").expect("bytes");

    assert_eq!(b.recv().signal(), Some(Signal::Terminate));
    assert!(b.is_terminated());
    assert_eq!(b.msglen(), 0);
    assert!(sink.drain().iter().any(|m| m.kind == MessageType::Fatal
        && m.text.contains("Packet size=1000001 too big")));
}

#[test]
fn errored_connection_stops_issuing_writes() {
    let transport = Counting {
        fail_writes: true,
        ..Counting::default()
    };
    let writes = Arc::clone(&transport.writes);
    let mut a = counting_bsock(transport, BsockOptions::new().sink(CollectingSink::shared()));

    a.set_msg(b"first");
    assert!(matches!(a.send(), Err(BsockError::Write { .. })));
    let after_failure = writes.load(Ordering::SeqCst);
    assert!(after_failure >= 1);

    a.set_msg(b"second");
    assert!(matches!(a.send(), Err(BsockError::Errored { errors: 1, .. })));
    assert!(a.signal(Signal::EndOfData).is_err());
    assert_eq!(writes.load(Ordering::SeqCst), after_failure);
    assert!(a.is_error());
}

// ============================================================================
// Cancellation and close
// ============================================================================

#[test]
fn cancel_reaches_master_and_both_duplicates() {
    let (mut a, _b) = bsock_pair(BsockOptions::new());
    let first = a.duplicate().expect("first duplicate");
    let second = a.duplicate().expect("second duplicate");
    assert_eq!(a.chain().len(), 3);

    let canceller = a.canceller();
    thread::spawn(move || canceller.cancel()).join().expect("cancel thread");

    for status in [a.status(), first.status(), second.status()] {
        assert!(status.is_terminated());
        assert!(status.is_timed_out());
    }
    assert!(matches!(first.send(b"late"), Err(BsockError::Terminated { .. })));
}

#[test]
fn second_close_performs_no_shutdown() {
    let transport = Counting::default();
    let shutdowns = Arc::clone(&transport.shutdowns);
    let mut a = counting_bsock(transport, BsockOptions::new());

    a.cancel();
    a.close();
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    a.close();
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert!(a.is_closed());
}

// ============================================================================
// Bandwidth
// ============================================================================

#[test]
fn bandwidth_limit_bounds_throughput() {
    let (mut a, mut b) = bsock_pair(BsockOptions::new().bandwidth_limit(100_000));
    let receiver = thread::spawn(move || {
        let mut total = 0;
        while let RecvResult::Data(n) = b.recv() {
            total += n;
        }
        total
    });

    let block = vec![0x5au8; 100_000];
    let started = Instant::now();
    for n in 0..10 {
        // The last frame lands past the limiter tick, so the debt left by
        // the earlier frames is always settled before the loop ends.
        if n == 9 {
            thread::sleep(Duration::from_millis(1));
        }
        a.set_msg(&block);
        a.send().expect("send");
    }
    let elapsed = started.elapsed();
    a.signal(Signal::EndOfData).expect("eod");

    assert_eq!(receiver.join().expect("receiver"), 1_000_000);
    assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
}
