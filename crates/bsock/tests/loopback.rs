//! Integration tests over real loopback TCP connections.
//!
//! Verifies that:
//! - data, command and signal frames cross a socket unchanged
//! - compressed payloads and offset-compressed payloads are restored
//! - closed duplicates stop counting and are released on the next duplicate
//! - cancelling a duplicate terminates the master and vice versa
//! - destroying a master wakes a duplicate blocked in a receive
//! - a bandwidth limit paces the writer
//! - a spool file is replayed in order with progress summing to the total
//! - readiness waits and blocking-mode switches behave on live sockets

use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use bandwidth::recorded_sleep_session;
use bsock::{
    BlockingMode, Bsock, BsockError, BsockOptions, RecvResult, WaitStatus,
};
use logging::{CollectingSink, MessageType};
use protocol::{FrameFlags, Signal};

fn pair_with(options: BsockOptions) -> (Bsock, Bsock) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let client = TcpStream::connect(addr).expect("connect");
    let (server, _) = listener.accept().expect("accept");
    (
        Bsock::from_stream(client, "Storage daemon", options.clone()).expect("client"),
        Bsock::from_stream(server, "Director", options).expect("server"),
    )
}

fn pair() -> (Bsock, Bsock) {
    pair_with(BsockOptions::new())
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn data_command_and_signal_frames_round_trip() {
    let (mut a, mut b) = pair();

    a.set_msg(b"Hello Director");
    a.send().expect("send data");
    a.set_msg(b"status");
    a.send_with(FrameFlags::new().with_command()).expect("send command");
    a.signal(Signal::EndOfData).expect("send signal");

    assert!(matches!(b.recv(), RecvResult::Data(14)));
    assert_eq!(b.msg(), b"Hello Director");
    assert!(matches!(b.recv(), RecvResult::Command(6)));
    assert_eq!(b.msg_text(), "status");
    assert!(b.last_flags().is_command());
    assert_eq!(b.recv().signal(), Some(Signal::EndOfData));

    assert_eq!(a.out_msg_no(), 3);
    assert_eq!(b.in_msg_no(), 2);
    assert_eq!(b.read_seqno(), 3);
}

#[test]
fn compressed_payloads_are_restored() {
    let (mut a, mut b) = pair_with(BsockOptions::new().compression(true));
    let text = b"attribute record with a lot of repetition ".repeat(200);

    a.set_msg(&text);
    a.send().expect("send");
    let stats = a.compression_stats();
    assert!(stats.comm_compressed_bytes < stats.comm_bytes);

    assert!(matches!(b.recv(), RecvResult::Data(n) if n == text.len()));
    assert_eq!(b.msg(), &text[..]);
}

#[test]
fn offset_compression_keeps_prefix_readable() {
    let (mut a, mut b) = pair_with(BsockOptions::new().compression(true));
    let mut payload = b"HDR:0042:".to_vec();
    payload.extend(b"data block contents ".repeat(300));

    a.set_msg(&payload);
    a.send_with(FrameFlags::new().with_offset(9).expect("offset fits"))
        .expect("send");

    assert!(matches!(b.recv(), RecvResult::Data(n) if n == payload.len()));
    assert_eq!(b.msg(), &payload[..]);
    assert_eq!(b.last_flags().offset(), 9);
    assert!(b.last_flags().is_data_compressed());
}

#[test]
fn peer_close_is_a_hard_eof() {
    let (a, mut b) = pair();
    a.destroy();
    assert!(matches!(b.recv(), RecvResult::HardEof));
    assert!(b.is_stop());
}

#[test]
fn terminate_signal_marks_receiver_terminated() {
    let (mut a, mut b) = pair();
    a.signal(Signal::Terminate).expect("send terminate");
    assert_eq!(b.recv().signal(), Some(Signal::Terminate));
    assert!(b.is_terminated());
    assert!(matches!(b.recv(), RecvResult::HardEof));
}

// ============================================================================
// Duplicates and cancellation
// ============================================================================

#[test]
fn duplicate_shares_the_stream() {
    let (mut a, mut b) = pair();
    let dup = a.duplicate().expect("duplicate");
    assert_eq!(a.duplicates(), 1);
    assert_eq!(a.chain().len(), 2);

    dup.send(b"from the duplicate").expect("dup send");
    assert!(matches!(b.recv(), RecvResult::Data(18)));

    b.set_msg(b"reply");
    b.send().expect("reply");
    let (result, payload) = dup.recv();
    assert!(matches!(result, RecvResult::Data(5)));
    assert_eq!(payload, b"reply");
}

#[test]
fn closed_duplicates_are_released() {
    let (mut a, _b) = pair();
    let first = a.duplicate().expect("first");
    let second = a.duplicate().expect("second");
    assert_eq!(a.duplicates(), 2);

    first.close().expect("close");
    assert_eq!(a.duplicates(), 1);
    assert!(first.is_alive());

    let _third = a.duplicate().expect("third");
    assert_eq!(a.duplicates(), 2);
    assert!(!first.is_alive());
    assert!(matches!(first.close(), Err(BsockError::Destroyed)));
    assert!(second.is_alive());
}

#[test]
fn cancelling_a_duplicate_terminates_the_master() {
    let (mut a, _b) = pair();
    let dup = a.duplicate().expect("duplicate");

    dup.cancel();
    assert!(a.is_terminated());
    assert!(a.is_timed_out());
    assert!(dup.status().is_terminated());

    a.set_msg(b"too late");
    assert!(matches!(a.send(), Err(BsockError::Terminated { .. })));
}

#[test]
fn destroying_master_wakes_blocked_duplicate() {
    let (mut a, _b) = pair();
    let dup = a.duplicate().expect("duplicate");
    let reader = {
        let dup = dup.clone();
        thread::spawn(move || dup.recv().0)
    };
    thread::sleep(Duration::from_millis(100));

    a.destroy();
    let result = reader.join().expect("join");
    assert!(!result.is_message());
    assert!(!dup.is_alive());
    assert!(matches!(dup.send(b"x"), Err(BsockError::Destroyed)));
    // cancel keeps working after the master is gone
    dup.cancel();
}

#[test]
fn close_is_idempotent() {
    let (mut a, _b) = pair();
    a.close();
    a.close();
    assert!(a.is_closed());
    a.set_msg(b"closed");
    assert!(matches!(a.send(), Err(BsockError::Closed)));
    assert!(matches!(a.recv(), RecvResult::HardEof));
}

#[test]
fn locking_serialises_master_and_duplicate() {
    let (mut a, mut b) = pair();
    assert!(a.set_locking());
    assert!(!a.set_locking());
    let dup = a.duplicate().expect("duplicate");

    let writer = {
        let dup = dup.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                dup.send(b"dup").expect("dup send");
            }
        })
    };
    for _ in 0..50 {
        a.set_msg(b"master");
        a.send().expect("master send");
    }
    writer.join().expect("join");

    let mut seen = 0;
    while seen < 100 {
        assert!(b.recv().is_message());
        assert!(b.msg() == b"dup" || b.msg() == b"master");
        seen += 1;
    }
    a.clear_locking();
    assert!(!a.is_locking());
}

// ============================================================================
// Bandwidth
// ============================================================================

#[test]
fn bandwidth_limit_paces_sends() {
    let mut session = recorded_sleep_session();
    session.clear();

    let (mut a, mut b) = pair();
    a.set_bwlimit(200_000);
    assert_eq!(a.bwlimit(), Some(200_000));

    let reader = thread::spawn(move || {
        let mut total = 0;
        while let RecvResult::Data(n) = b.recv() {
            total += n;
        }
        total
    });

    // Sends closer together than the limiter tick only accumulate debt, so
    // space them out to make every send settle its share.
    let block = vec![7u8; 20_000];
    let started = Instant::now();
    for n in 0..6 {
        if n > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        a.set_msg(&block);
        a.send().expect("send");
    }
    let elapsed = started.elapsed();
    a.signal(Signal::EndOfData).expect("eod");

    assert_eq!(reader.join().expect("join"), 120_000);
    // Every frame, the first included, is paid for at 200 kB/s.
    assert!(elapsed >= Duration::from_millis(450), "elapsed {elapsed:?}");
    let sleeps = session.take();
    assert!(!sleeps.is_empty());
    let slept: Duration = sleeps.iter().sum();
    assert!(slept >= Duration::from_millis(300), "slept {slept:?}");

    a.set_bwlimit(0);
    assert_eq!(a.bwlimit(), None);
}

// ============================================================================
// Spool replay
// ============================================================================

#[test]
fn spool_is_replayed_in_order() {
    let (mut a, mut b) = pair();
    a.attach_spool(tempfile::tempfile().expect("spool file"));
    a.set_spooling(true);
    assert!(a.is_spooling());

    for record in [&b"first"[..], b"second", b"third"] {
        a.set_msg(record);
        a.spool_msg().expect("spool record");
    }
    a.spool_signal(Signal::EndOfData).expect("spool signal");
    a.set_spooling(false);

    let total = 3 * 4 + 5 + 6 + 5 + 4;
    let mut reported = Vec::new();
    a.despool(|delta| reported.push(delta), total).expect("despool");
    assert_eq!(reported.iter().sum::<i64>(), total);

    for expected in [&b"first"[..], b"second", b"third"] {
        assert!(b.recv().is_message());
        assert_eq!(b.msg(), expected);
    }
    assert_eq!(b.recv().signal(), Some(Signal::EndOfData));
}

#[test]
fn truncated_spool_is_fatal() {
    use std::io::Write;

    let sink = CollectingSink::shared();
    let (mut a, _b) = pair_with(BsockOptions::new().sink(sink.clone()));
    let mut file = tempfile::tempfile().expect("spool file");
    file.write_all(&100i32.to_be_bytes()).expect("header");
    file.write_all(b"short").expect("payload");
    a.attach_spool(file);

    let mut reported = 0;
    let outcome = a.despool(|delta| reported += delta, 104);
    assert!(outcome.is_err());
    assert_eq!(reported, 104);
    assert!(
        sink.drain()
            .iter()
            .any(|m| m.kind == MessageType::Fatal && m.text.contains("Wanted=100 got=5"))
    );
}

#[test]
fn despool_without_spool_fails() {
    let (mut a, _b) = pair();
    assert!(matches!(a.despool(|_| {}, 0), Err(BsockError::NoSpool)));
}

// ============================================================================
// Readiness and blocking mode
// ============================================================================

#[test]
fn wait_data_reports_timeout_then_ready() {
    let (mut a, mut b) = pair();
    assert_eq!(b.wait_data(Duration::from_millis(50)), WaitStatus::Timeout);

    a.set_msg(b"ping");
    a.send().expect("send");
    assert_eq!(b.wait_data(Duration::from_secs(5)), WaitStatus::Ready);
    assert_eq!(b.wait_data_intr(Duration::from_secs(5)), WaitStatus::Ready);
    assert!(b.recv().is_message());
}

#[test]
fn blocking_mode_switches_report_previous_mode() {
    let (mut a, _b) = pair();
    assert_eq!(a.blocking_mode(), BlockingMode::Blocking);
    let previous = a.set_nonblocking().expect("nonblocking");
    assert_eq!(previous, BlockingMode::Blocking);
    assert_eq!(a.blocking_mode(), BlockingMode::NonBlocking);
    assert_eq!(a.set_blocking().expect("blocking"), BlockingMode::NonBlocking);
    a.restore_blocking(previous).expect("restore");
    assert_eq!(a.blocking_mode(), BlockingMode::Blocking);
}
