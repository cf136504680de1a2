//! One framed connection: buffers, counters and the send/receive paths.

use std::borrow::Cow;
use std::fmt::{self, Display};
use std::fs::File;
use std::io::{self, Seek, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bandwidth::BandwidthLimiter;
use compress::{CommCompressor, CompressionPolicy, CompressionStats, decompress_message};
use logging::{MessageType, trace_frame, trace_limit, trace_net};
use protocol::{
    FrameFlags, HEADER_LEN, HeaderWord, MAX_RECV_PAYLOAD, MAX_SEND_PAYLOAD,
    Signal, assemble_data_frame, assemble_signal_frame,
};

use crate::chain::{Canceller, Chain, LockSet, MemberStatus};
use crate::config::BsockOptions;
use crate::deadline::DeadlineGuard;
use crate::error::{BsockError, OversizedPacket, RecvError, RecvResult};
use crate::peer::PeerIdentity;
use crate::send_hook::SendHook;
use crate::transport::Transport;

/// Spool file attached to a connection plus its data-end bookkeeping.
#[derive(Debug)]
pub(crate) struct SpoolState {
    pub(crate) file: File,
    pub(crate) file_index: i32,
    pub(crate) last_file_index: i32,
    pub(crate) data_end: u64,
    pub(crate) last_data_end: u64,
}

/// A framed, optionally compressed and throttled message connection.
///
/// The message buffer always holds the current payload followed by one NUL
/// byte, so text payloads can be handed to C-string style consumers.
/// Lifecycle flags live in a [`MemberStatus`] shared with the chain, which
/// is how cancellation from another thread reaches this connection.
pub struct Connection {
    pub(crate) transport: Option<Box<dyn Transport>>,
    pub(crate) peer: PeerIdentity,
    pub(crate) local_addr: Option<SocketAddr>,
    pub(crate) peer_addr: Option<SocketAddr>,
    pub(crate) msg: Vec<u8>,
    pub(crate) msglen: usize,
    scratch: Vec<u8>,
    compressor: CommCompressor,
    limiter: Option<BandwidthLimiter>,
    last_flags: FrameFlags,
    in_msg_no: u64,
    out_msg_no: u64,
    read_seqno: u64,
    pub(crate) status: Arc<MemberStatus>,
    pub(crate) chain: Arc<Chain>,
    pub(crate) duped: bool,
    pub(crate) last_os_error: Option<i32>,
    pub(crate) options: BsockOptions,
    send_hook: Option<Box<dyn SendHook>>,
    timer: Option<Instant>,
    pub(crate) spool: Option<SpoolState>,
    spooling: bool,
    pub(crate) blocking: bool,
}

enum Fill {
    Complete,
    Short(usize),
    Failed(io::Error),
}

impl Connection {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        peer: PeerIdentity,
        options: BsockOptions,
        chain: Arc<Chain>,
        duped: bool,
    ) -> Self {
        let status = Arc::new(MemberStatus::default());
        chain.register(&status);
        let local_addr = transport.local_addr().ok();
        let peer_addr = transport.peer_addr().ok();
        let mut compressor = CommCompressor::new(CompressionPolicy::default());
        compressor.set_enabled(options.compression);
        let limiter = options.bandwidth_limit.map(BandwidthLimiter::new);
        Self {
            transport: Some(transport),
            peer,
            local_addr,
            peer_addr,
            msg: vec![0],
            msglen: 0,
            scratch: Vec::new(),
            compressor,
            limiter,
            last_flags: FrameFlags::NONE,
            in_msg_no: 0,
            out_msg_no: 0,
            read_seqno: 0,
            status,
            chain,
            duped,
            last_os_error: None,
            options,
            send_hook: None,
            timer: None,
            spool: None,
            spooling: false,
            blocking: true,
        }
    }

    /// Creates a duplicate member of the same chain over `transport`.
    pub(crate) fn duplicate_of(master: &Self, transport: Box<dyn Transport>) -> Self {
        let mut dup = Self::new(
            transport,
            master.peer.clone(),
            master.options.clone(),
            Arc::clone(&master.chain),
            true,
        );
        dup.compressor.set_enabled(master.compressor.policy().enabled);
        dup.limiter = master
            .limiter
            .as_ref()
            .map(|limiter| BandwidthLimiter::new(limiter.rate()));
        dup
    }

    // ==== identity ====================================================

    /// Remote end as shown in diagnostics.
    pub const fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Name of the remote daemon.
    pub fn who(&self) -> &str {
        &self.peer.who
    }

    /// Host given when the connection was made.
    pub fn host(&self) -> &str {
        &self.peer.host
    }

    /// Remote port.
    pub const fn port(&self) -> u16 {
        self.peer.port
    }

    /// Renames the remote end in diagnostics.
    pub fn set_who(&mut self, who: impl Into<String>) {
        self.peer.who = who.into();
    }

    /// Local socket address, when the transport reports one.
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Remote socket address, when the transport reports one.
    pub const fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Remote IP address as text.
    pub fn get_peer(&mut self) -> io::Result<String> {
        if self.peer_addr.is_none() {
            let transport = self.transport.as_deref().ok_or_else(not_connected)?;
            self.peer_addr = Some(transport.peer_addr()?);
        }
        self.peer_addr
            .map(|addr| addr.ip().to_string())
            .ok_or_else(not_connected)
    }

    /// Options this connection was created with.
    pub const fn options(&self) -> &BsockOptions {
        &self.options
    }

    /// Reports whether this connection is a duplicate.
    pub const fn is_duped(&self) -> bool {
        self.duped
    }

    /// Reports whether the transport is a TLS session.
    pub fn is_tls(&self) -> bool {
        self.transport.as_deref().is_some_and(|transport| transport.is_tls())
    }

    // ==== message buffer ==============================================

    /// Current message payload.
    pub fn msg(&self) -> &[u8] {
        &self.msg[..self.msglen]
    }

    /// Current message as text, with invalid UTF-8 replaced.
    pub fn msg_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.msg())
    }

    /// Length of the current message.
    pub const fn msglen(&self) -> usize {
        self.msglen
    }

    /// Replaces the current message.
    pub fn set_msg(&mut self, payload: &[u8]) {
        self.msg.clear();
        self.msg.extend_from_slice(payload);
        self.terminate_msg();
    }

    /// Exchanges the message with `other` without copying.
    ///
    /// Afterwards `other` holds the previous payload (without the trailing
    /// NUL) and the connection's message is the previous content of `other`.
    pub fn swap_msgs(&mut self, other: &mut Vec<u8>) {
        self.msg.truncate(self.msglen);
        std::mem::swap(&mut self.msg, other);
        self.terminate_msg();
    }

    fn terminate_msg(&mut self) {
        self.msglen = self.msg.len();
        self.msg.push(0);
    }

    /// Flags of the last received frame.
    pub const fn last_flags(&self) -> FrameFlags {
        self.last_flags
    }

    // ==== counters and state ==========================================

    /// Messages received.
    pub const fn in_msg_no(&self) -> u64 {
        self.in_msg_no
    }

    /// Messages sent.
    pub const fn out_msg_no(&self) -> u64 {
        self.out_msg_no
    }

    /// Receive calls that reached the transport.
    pub const fn read_seqno(&self) -> u64 {
        self.read_seqno
    }

    /// Compression byte counters.
    pub const fn compression_stats(&self) -> CompressionStats {
        self.compressor.stats()
    }

    /// Transport errors since the connection was made.
    pub fn errors(&self) -> u32 {
        self.status.errors()
    }

    /// Reports whether the connection was closed.
    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Reports whether the connection was terminated.
    pub fn is_terminated(&self) -> bool {
        self.status.is_terminated()
    }

    /// Reports whether a deadline expired or the connection was canceled.
    pub fn is_timed_out(&self) -> bool {
        self.status.is_timed_out()
    }

    /// Reports whether the connection can no longer carry messages.
    pub fn is_stop(&self) -> bool {
        self.errors() > 0 || self.is_terminated() || self.is_closed()
    }

    /// Reports whether a transport error occurred.
    pub fn is_error(&self) -> bool {
        self.errors() > 0
    }

    /// Text of the last captured OS error.
    pub fn bstrerror(&self) -> String {
        match self.last_os_error {
            None | Some(0) => "I/O Error".to_owned(),
            Some(code) => io::Error::from_raw_os_error(code).to_string(),
        }
    }

    /// Shared status flags of this member.
    pub fn status(&self) -> &Arc<MemberStatus> {
        &self.status
    }

    // ==== knobs =======================================================

    /// Enables or disables comm-line compression for later sends.
    pub fn set_compression(&mut self, enabled: bool) {
        self.compressor.set_enabled(enabled);
    }

    /// Sets the writer-side bandwidth limit; zero removes it.
    pub fn set_bwlimit(&mut self, bytes_per_second: u64) {
        self.limiter = match std::num::NonZeroU64::new(bytes_per_second) {
            Some(rate) => match self.limiter.take() {
                Some(mut limiter) => {
                    limiter.set_rate(rate);
                    Some(limiter)
                }
                None => Some(BandwidthLimiter::new(rate)),
            },
            None => None,
        };
    }

    /// Current bandwidth limit in bytes per second.
    pub fn bwlimit(&self) -> Option<u64> {
        self.limiter.as_ref().map(|limiter| limiter.rate().get())
    }

    /// Suppresses or restores job messages for this connection.
    pub fn set_suppress_error_msgs(&self, suppress: bool) {
        self.status.set_suppress_errors(suppress);
    }

    /// Installs a flow-control hook.
    pub fn install_send_hook(&mut self, hook: Box<dyn SendHook>) {
        self.send_hook = Some(hook);
    }

    /// Removes the flow-control hook.
    pub fn uninstall_send_hook(&mut self) {
        self.send_hook = None;
    }

    /// Bounds every read and write until [`Self::stop_timer`] by `limit`.
    pub fn start_timer(&mut self, limit: Duration) {
        self.timer = Some(Instant::now() + limit);
    }

    /// Removes the timer set by [`Self::start_timer`].
    pub fn stop_timer(&mut self) {
        self.timer = None;
    }

    /// Marks every member of the chain terminated and timed out.
    pub fn cancel(&self) {
        self.chain.cancel();
    }

    /// Handle that cancels this connection's chain from any thread.
    pub fn canceller(&self) -> Canceller {
        Canceller::new(Arc::clone(&self.chain))
    }

    /// Replaces the transport through `upgrade`, for example to run a TLS
    /// handshake. A failed upgrade consumes the transport and leaves the
    /// connection closed.
    pub fn replace_transport<F>(&mut self, upgrade: F) -> io::Result<()>
    where
        F: FnOnce(Box<dyn Transport>) -> io::Result<Box<dyn Transport>>,
    {
        let transport = self.transport.take().ok_or_else(not_connected)?;
        match upgrade(transport) {
            Ok(replacement) => {
                self.transport = Some(replacement);
                Ok(())
            }
            Err(err) => {
                self.capture_os_error(&err);
                self.status.add_error();
                self.status.set_closed();
                self.status.set_terminated();
                Err(err)
            }
        }
    }

    // ==== spool =======================================================

    /// Attaches a spool file. Frames are written to it with
    /// [`Self::spool_msg`] and replayed with [`Self::despool`].
    pub fn attach_spool(&mut self, file: File) {
        self.spool = Some(SpoolState {
            file,
            file_index: 0,
            last_file_index: 0,
            data_end: 0,
            last_data_end: 0,
        });
    }

    /// Detaches and returns the spool file.
    pub fn detach_spool(&mut self) -> Option<File> {
        self.set_spooling(false);
        self.spool.take().map(|spool| spool.file)
    }

    /// Switches spooling on or off. Spooled traffic is never compressed.
    pub fn set_spooling(&mut self, spooling: bool) {
        self.spooling = spooling && self.spool.is_some();
        self.compressor.set_spooling(self.spooling);
    }

    /// Reports whether messages are being diverted to the spool.
    pub const fn is_spooling(&self) -> bool {
        self.spooling
    }

    /// Appends the current message to the spool file.
    pub fn spool_msg(&mut self) -> Result<(), BsockError> {
        let spool = self.spool.as_mut().ok_or(BsockError::NoSpool)?;
        protocol::write_spool_record(&mut spool.file, &self.msg[..self.msglen])?;
        Ok(())
    }

    /// Appends a signal record to the spool file.
    pub fn spool_signal(&mut self, signal: Signal) -> Result<(), BsockError> {
        let spool = self.spool.as_mut().ok_or(BsockError::NoSpool)?;
        protocol::write_spool_marker(&mut spool.file, signal.code())?;
        Ok(())
    }

    /// Records that everything spooled so far belongs to `file_index` or an
    /// earlier file. Ignored unless spooling and `file_index` advances.
    pub fn set_data_end(&mut self, file_index: i32) -> io::Result<()> {
        if !self.spooling {
            return Ok(());
        }
        if let Some(spool) = self.spool.as_mut() {
            if file_index > spool.file_index {
                spool.last_file_index = spool.file_index;
                spool.last_data_end = spool.data_end;
                spool.file_index = file_index;
                spool.data_end = spool.file.stream_position()?;
            }
        }
        Ok(())
    }

    /// Spool offset where the last complete file ended.
    pub fn last_data_end(&self) -> u64 {
        self.spool.as_ref().map_or(0, |spool| spool.last_data_end)
    }

    /// File index matching [`Self::last_data_end`].
    pub fn last_file_index(&self) -> i32 {
        self.spool.as_ref().map_or(0, |spool| spool.last_file_index)
    }

    // ==== send ========================================================

    /// Sends the current message with no flags.
    pub fn send(&mut self) -> Result<(), BsockError> {
        self.send_with(FrameFlags::NONE)
    }

    /// Sends the current message with per-frame flags.
    ///
    /// With a data-compression offset, the bytes before the offset travel
    /// uncompressed and only the remainder is compressed.
    pub fn send_with(&mut self, flags: FrameFlags) -> Result<(), BsockError> {
        self.check_sendable(self.msglen)?;
        self.check_send_hook()?;

        let lockset = self.chain.lockset();
        let _write = lockset.as_deref().map(LockSet::lock_write);

        let frame = self.build_data_frame(flags)?;
        trace_frame!(
            seq = self.out_msg_no + 1,
            len = self.msglen,
            wire = frame.len(),
            flags = format_args!("{:#x}", flags.to_wire()),
            "SEND"
        );
        self.write_frame(&frame)
    }

    /// Formats `args` into the message buffer and sends it.
    ///
    /// Fails without a job message when the connection is already unusable.
    pub fn fsend(&mut self, args: fmt::Arguments<'_>) -> Result<(), BsockError> {
        if let Some(err) = self.unusable() {
            return Err(err);
        }
        self.msg.clear();
        self.msg.write_fmt(args)?;
        self.terminate_msg();
        self.send()
    }

    /// Sends a signal. Sending [`Signal::Terminate`] also suppresses further
    /// job messages from this connection.
    pub fn signal(&mut self, signal: Signal) -> Result<(), BsockError> {
        if signal.is_terminate() {
            self.status.set_suppress_errors(true);
        }
        self.check_sendable(0)?;
        self.check_send_hook()?;

        let lockset = self.chain.lockset();
        let _write = lockset.as_deref().map(LockSet::lock_write);

        let frame = assemble_signal_frame(signal.code())?;
        trace_frame!(seq = self.out_msg_no + 1, %signal, "SEND signal");
        self.write_frame(&frame)
    }

    /// Sends a header-only record read back from a spool: a signal when
    /// negative, an empty message when zero.
    pub(crate) fn send_marker(&mut self, value: i32) -> Result<(), BsockError> {
        if value < 0 {
            return self.signal(Signal::from_code(value));
        }
        self.msg.clear();
        self.terminate_msg();
        self.send()
    }

    fn unusable(&self) -> Option<BsockError> {
        if self.status.is_closed() {
            Some(BsockError::Closed)
        } else if self.status.errors() > 0 {
            Some(BsockError::Errored {
                errors: self.status.errors(),
                peer: self.peer.clone(),
            })
        } else if self.status.is_terminated() {
            Some(BsockError::Terminated {
                peer: self.peer.clone(),
            })
        } else {
            None
        }
    }

    fn check_sendable(&self, len: usize) -> Result<(), BsockError> {
        let rejection = self.unusable().or_else(|| {
            (len > MAX_SEND_PAYLOAD).then(|| BsockError::InsaneLength {
                len,
                peer: self.peer.clone(),
            })
        });
        match rejection {
            Some(err) => {
                self.report(MessageType::Error, &err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn check_send_hook(&mut self) -> Result<(), BsockError> {
        let allowed = self.send_hook.as_mut().is_none_or(|hook| hook.allow_send());
        if allowed {
            return Ok(());
        }
        let err = BsockError::FlowControl {
            peer: self.peer.clone(),
        };
        trace_net!(peer = %self.peer, "flow control refused send");
        self.options.sink.emit(MessageType::Error, &err.to_string());
        Err(err)
    }

    fn build_data_frame(&mut self, requested: FrameFlags) -> Result<Vec<u8>, BsockError> {
        let payload = &self.msg[..self.msglen];
        let (compressed, body) = if requested.is_data_compressed() {
            (true, payload)
        } else if requested.is_no_compress() {
            (false, payload)
        } else {
            match self.compressor.compress(payload, requested.offset())? {
                Some(packed) => (true, packed),
                None => (false, payload),
            }
        };

        let flags = if requested.has_offset() && compressed {
            requested.with_data_compressed()
        } else {
            requested
        };
        // Data compression behind an offset is announced in the flags word
        // only; the length word compression bit means whole-payload.
        let comm_compressed = compressed && !flags.has_offset();
        Ok(assemble_data_frame(comm_compressed, flags, &[body])?)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), BsockError> {
        self.out_msg_no += 1;
        self.status.set_timed_out(false);

        let (written, failure) = match self.transport.as_deref_mut() {
            Some(transport) => match DeadlineGuard::arm(transport, self.options.io_timeout, self.timer) {
                Ok(mut guard) => write_fully(guard.transport(), frame),
                Err(err) => (0, Some(err)),
            },
            None => (0, Some(not_connected())),
        };

        if written == frame.len() && failure.is_none() {
            self.throttle(frame.len());
            return Ok(());
        }

        self.status.add_error();
        let err = match failure {
            Some(source) => {
                self.note_io_failure(&source);
                BsockError::Write {
                    len: frame.len(),
                    peer: self.peer.clone(),
                    source,
                }
            }
            None => {
                self.last_os_error = Some(libc::EIO);
                BsockError::ShortWrite {
                    len: frame.len(),
                    accepted: written,
                    peer: self.peer.clone(),
                }
            }
        };
        if matches!(err, BsockError::ShortWrite { .. }) {
            self.options.sink.emit(MessageType::Error, &err.to_string());
        } else {
            self.report(MessageType::Error, &err);
        }
        Err(err)
    }

    fn throttle(&mut self, bytes: usize) {
        if let Some(limiter) = self.limiter.as_mut() {
            let sleep = limiter.register(bytes);
            if !sleep.is_noop() {
                trace_limit!(
                    bytes,
                    requested = ?sleep.requested(),
                    actual = ?sleep.actual(),
                    "bandwidth limiter slept"
                );
            }
        }
    }

    // ==== receive =====================================================

    /// Receives one message.
    ///
    /// Data and command payloads land in the message buffer; see
    /// [`RecvResult`] for the other outcomes. A connection with errors, or
    /// one that was terminated or closed, returns [`RecvResult::HardEof`]
    /// without touching the transport.
    pub fn recv(&mut self) -> RecvResult {
        self.msg.clear();
        self.terminate_msg();
        self.last_flags = FrameFlags::NONE;
        if self.is_stop() {
            return RecvResult::HardEof;
        }

        let lockset = self.chain.lockset();
        let _read = lockset.as_deref().map(LockSet::lock_read);

        self.read_seqno += 1;
        let result = self.recv_frame();
        trace_frame!(
            seq = self.read_seqno,
            flags = format_args!("{:#x}", self.last_flags.to_wire()),
            result = ?result,
            "RECV"
        );
        result
    }

    fn recv_frame(&mut self) -> RecvResult {
        let mut word = [0u8; HEADER_LEN];
        if let Some(stop) = self.read_header_word(&mut word) {
            return stop;
        }
        let header = HeaderWord::from(word);

        if let HeaderWord::Length { extended: true, .. } = header {
            let mut flags_word = [0u8; HEADER_LEN];
            if let Some(stop) = self.read_header_word(&mut flags_word) {
                return stop;
            }
            self.last_flags = FrameFlags::from_wire(u32::from_be_bytes(flags_word));
        }
        let flags = self.last_flags;

        let (len, compressed) = match header {
            HeaderWord::Signal(code) => {
                let signal = Signal::from_code(code);
                if signal.is_terminate() {
                    self.status.set_terminated();
                }
                self.last_os_error = Some(libc::ENODATA);
                return RecvResult::Signal(signal);
            }
            HeaderWord::Length {
                len, compressed, ..
            } => (len, compressed),
        };

        if len == 0 {
            self.in_msg_no += 1;
            return message_result(flags, 0);
        }

        if header.is_oversized() {
            let err = OversizedPacket {
                len,
                max: MAX_RECV_PAYLOAD,
                peer: self.peer.clone(),
            };
            self.options.sink.emit(MessageType::Fatal, &err.to_string());
            self.status.set_terminated();
            self.last_os_error = Some(libc::ENODATA);
            return RecvResult::Signal(Signal::Terminate);
        }

        self.msg.resize(len + 1, 0);
        let filled = read_fully_with_deadline(
            self.transport.as_deref_mut(),
            self.options.io_timeout,
            self.timer,
            &mut self.msg[..len],
        );
        match filled {
            Fill::Complete => {}
            Fill::Short(0) => {
                let source = io::Error::from_raw_os_error(libc::ENODATA);
                return self.payload_read_failed(source);
            }
            Fill::Failed(source) => return self.payload_read_failed(source),
            Fill::Short(got) => {
                self.in_msg_no += 1;
                return self.truncated(len, got);
            }
        }
        self.in_msg_no += 1;

        if compressed || (flags.has_offset() && flags.is_data_compressed()) {
            self.msg.truncate(len);
            match decompress_message(&mut self.msg, flags.offset(), &mut self.scratch) {
                Ok(n) => {
                    self.msglen = n;
                    self.msg.push(0);
                }
                Err(source) => {
                    self.msglen = 0;
                    self.msg.clear();
                    self.msg.push(0);
                    self.last_os_error = Some(libc::EIO);
                    self.status.add_error();
                    let err = RecvError::Decompress {
                        peer: self.peer.clone(),
                        source,
                    };
                    self.options.sink.emit(MessageType::Error, &err.to_string());
                    return RecvResult::Error(err);
                }
            }
        } else {
            self.msglen = len;
            self.msg[len] = 0;
        }

        message_result(flags, self.msglen)
    }

    /// Reads one header word. Returns the result to hand back when the read
    /// did not complete.
    fn read_header_word(&mut self, word: &mut [u8; HEADER_LEN]) -> Option<RecvResult> {
        let filled = read_fully_with_deadline(
            self.transport.as_deref_mut(),
            self.options.io_timeout,
            self.timer,
            word,
        );
        match filled {
            Fill::Complete => None,
            Fill::Short(0) => {
                self.last_os_error = Some(libc::ENODATA);
                self.status.add_error();
                Some(RecvResult::HardEof)
            }
            Fill::Failed(err) => {
                self.note_io_failure(&err);
                self.status.add_error();
                Some(RecvResult::HardEof)
            }
            Fill::Short(got) => Some(self.truncated(HEADER_LEN, got)),
        }
    }

    fn truncated(&mut self, expected: usize, got: usize) -> RecvResult {
        self.last_os_error = Some(libc::EIO);
        self.status.add_error();
        let err = RecvError::Truncated {
            expected,
            got,
            peer: self.peer.clone(),
        };
        self.options.sink.emit(MessageType::Error, &err.to_string());
        RecvResult::Error(err)
    }

    fn payload_read_failed(&mut self, source: io::Error) -> RecvResult {
        self.note_io_failure(&source);
        self.status.add_error();
        self.msg.clear();
        self.terminate_msg();
        let err = RecvError::Read {
            peer: self.peer.clone(),
            source,
        };
        self.options.sink.emit(MessageType::Error, &err.to_string());
        RecvResult::Error(err)
    }

    // ==== teardown ====================================================

    /// Closes the connection. Calling it again does nothing.
    ///
    /// The master also drops the chain locks and ends a TLS session
    /// cleanly. A connection that timed out is shut down in both directions
    /// first so pending data is discarded.
    pub fn close(&mut self) {
        if self.status.is_closed() {
            return;
        }
        if !self.duped {
            self.chain.disable_locking();
        }
        self.status.set_closed();
        self.status.set_terminated();
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        if self.duped {
            return;
        }
        if transport.is_tls() {
            if let Err(err) = transport.tls_shutdown() {
                trace_net!(peer = %self.peer, error = %err, "TLS shutdown failed");
            }
        }
        if self.status.is_timed_out() {
            let _ = transport.shutdown(Shutdown::Both);
        }
        trace_net!(peer = %self.peer, "connection closed");
    }

    // ==== helpers =====================================================

    pub(crate) fn report(&self, kind: MessageType, err: &dyn Display) {
        if !self.status.errors_suppressed() {
            self.options.sink.emit(kind, &err.to_string());
        }
    }

    pub(crate) fn capture_os_error(&mut self, err: &io::Error) {
        self.last_os_error = Some(err.raw_os_error().unwrap_or(libc::EIO));
    }

    fn note_io_failure(&mut self, err: &io::Error) {
        self.capture_os_error(err);
        if matches!(
            err.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        ) {
            self.status.set_timed_out(true);
        }
    }

    pub(crate) fn transport_ref(&self) -> Result<&dyn Transport, BsockError> {
        self.transport.as_deref().ok_or(BsockError::Closed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("msglen", &self.msglen)
            .field("duped", &self.duped)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

const fn message_result(flags: FrameFlags, len: usize) -> RecvResult {
    if flags.is_command() {
        RecvResult::Command(len)
    } else {
        RecvResult::Data(len)
    }
}

fn not_connected() -> io::Error {
    io::Error::from(io::ErrorKind::NotConnected)
}

/// Writes `buf`, returning the bytes accepted and the error that stopped
/// the write early, if any.
fn write_fully<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> (usize, Option<io::Error>) {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return (written, Some(err)),
        }
    }
    if written == buf.len() {
        if let Err(err) = writer.flush() {
            return (written, Some(err));
        }
    }
    (written, None)
}

fn read_fully_with_deadline(
    transport: Option<&mut (dyn Transport + 'static)>,
    io_timeout: Duration,
    timer: Option<Instant>,
    buf: &mut [u8],
) -> Fill {
    let Some(transport) = transport else {
        return Fill::Failed(not_connected());
    };
    let mut guard = match DeadlineGuard::arm(transport, io_timeout, timer) {
        Ok(guard) => guard,
        Err(err) => return Fill::Failed(err),
    };
    let reader = guard.transport();
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Fill::Failed(err),
        }
    }
    if filled == buf.len() {
        Fill::Complete
    } else {
        Fill::Short(filled)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};
    use std::sync::Mutex;

    use logging::CollectingSink;
    use protocol::{COMPRESSED_BIT, EXTENDED_HEADER_LEN as EXT};

    use super::*;

    /// In-memory transport: reads from a canned input, records writes.
    #[derive(Clone, Default)]
    struct Scripted {
        input: Arc<Mutex<Cursor<Vec<u8>>>>,
        output: Arc<Mutex<Vec<u8>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl Scripted {
        fn with_input(bytes: Vec<u8>) -> Self {
            let scripted = Self::default();
            *scripted.input.lock().unwrap() = Cursor::new(bytes);
            scripted
        }

        fn written(&self) -> Vec<u8> {
            self.output.lock().unwrap().clone()
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.lock().unwrap().read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            *self.writes.lock().unwrap() += 1;
            self.output.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Scripted {
        fn set_read_timeout(&self, _: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
        fn set_write_timeout(&self, _: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
        fn shutdown(&self, _: Shutdown) -> io::Result<()> {
            Ok(())
        }
        fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
            Ok(Box::new(self.clone()))
        }
        fn peer_addr(&self) -> io::Result<SocketAddr> {
            Ok(SocketAddr::from(([127, 0, 0, 1], 9101)))
        }
        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(SocketAddr::from(([127, 0, 0, 1], 40000)))
        }
        fn set_nonblocking(&self, _: bool) -> io::Result<()> {
            Ok(())
        }
    }

    fn connection(transport: Scripted, sink: &Arc<CollectingSink>) -> Connection {
        let options = BsockOptions::new().sink(sink.clone());
        Connection::new(
            Box::new(transport),
            PeerIdentity::new("Director daemon", "dir", 9101),
            options,
            Chain::new(),
            false,
        )
    }

    #[test]
    fn plain_message_uses_basic_header() {
        let wire = Scripted::default();
        let sink = CollectingSink::shared();
        let mut conn = connection(wire.clone(), &sink);
        conn.set_msg(b"status");
        conn.send().expect("send");

        let written = wire.written();
        assert_eq!(&written[..HEADER_LEN], &6i32.to_be_bytes());
        assert_eq!(&written[HEADER_LEN..], b"status");
        assert_eq!(conn.out_msg_no(), 1);
        assert_eq!(*wire.writes.lock().unwrap(), 1);
    }

    #[test]
    fn fsend_formats_into_message_buffer() {
        let wire = Scripted::default();
        let sink = CollectingSink::shared();
        let mut conn = connection(wire.clone(), &sink);
        conn.fsend(format_args!("Hello {} calling\n", "bconsole"))
            .expect("send");
        assert_eq!(conn.msg(), b"Hello bconsole calling\n");
        assert_eq!(&wire.written()[HEADER_LEN..], b"Hello bconsole calling\n");
    }

    #[test]
    fn offset_compression_keeps_header_region_plain() {
        let wire = Scripted::default();
        let sink = CollectingSink::shared();
        let mut conn = connection(wire.clone(), &sink);
        conn.set_compression(true);
        let mut payload = b"HDR:".to_vec();
        payload.extend(b"attribute ".repeat(200));
        conn.set_msg(&payload);
        conn.send_with(FrameFlags::new().with_offset(4).expect("offset"))
            .expect("send");

        let written = wire.written();
        let length_word = i32::from_be_bytes(written[..4].try_into().unwrap());
        assert_eq!(length_word & COMPRESSED_BIT, 0);
        let flags = FrameFlags::from_wire(u32::from_be_bytes(written[4..8].try_into().unwrap()));
        assert!(flags.is_data_compressed());
        assert_eq!(flags.offset(), 4);
        assert_eq!(&written[EXT..EXT + 4], b"HDR:");
        assert!(written.len() < payload.len());
    }

    #[test]
    fn offset_frame_is_restored_on_receive() {
        let sender_wire = Scripted::default();
        let sink = CollectingSink::shared();
        let mut sender = connection(sender_wire.clone(), &sink);
        sender.set_compression(true);
        let mut payload = b"HDR:".to_vec();
        payload.extend(b"attribute ".repeat(200));
        sender.set_msg(&payload);
        sender
            .send_with(FrameFlags::new().with_offset(4).expect("offset"))
            .expect("send");

        let mut receiver = connection(Scripted::with_input(sender_wire.written()), &sink);
        let result = receiver.recv();
        assert_eq!(result.message_len(), Some(payload.len()));
        assert_eq!(receiver.msg(), payload.as_slice());
        assert_eq!(receiver.msg.len(), payload.len() + 1);
    }

    #[test]
    fn zero_length_command_is_reported_as_command() {
        let mut input = Vec::new();
        protocol::PacketHeader::data(0, false, FrameFlags::new().with_command())
            .expect("header")
            .encode_into(&mut input);
        let sink = CollectingSink::shared();
        let mut conn = connection(Scripted::with_input(input), &sink);
        assert!(matches!(conn.recv(), RecvResult::Command(0)));
        assert_eq!(conn.in_msg_no(), 1);
    }

    #[test]
    fn partial_header_is_an_error() {
        let sink = CollectingSink::shared();
        let mut conn = connection(Scripted::with_input(vec![0, 0]), &sink);
        assert!(matches!(
            conn.recv(),
            RecvResult::Error(RecvError::Truncated {
                expected: 4,
                got: 2,
                ..
            })
        ));
        assert!(sink.contains("Read expected 4 got 2 from Director daemon:dir:9101"));
        assert_eq!(conn.errors(), 1);
    }

    #[test]
    fn clean_eof_is_hard_eof_and_poisons_connection() {
        let sink = CollectingSink::shared();
        let mut conn = connection(Scripted::with_input(Vec::new()), &sink);
        assert!(matches!(conn.recv(), RecvResult::HardEof));
        assert_eq!(conn.errors(), 1);
        assert_eq!(conn.bstrerror(), io::Error::from_raw_os_error(libc::ENODATA).to_string());
        assert!(matches!(conn.recv(), RecvResult::HardEof));
        assert_eq!(conn.read_seqno(), 1);
    }

    #[test]
    fn bstrerror_defaults_to_io_error() {
        let sink = CollectingSink::shared();
        let conn = connection(Scripted::default(), &sink);
        assert_eq!(conn.bstrerror(), "I/O Error");
    }

    #[test]
    fn insane_length_is_rejected_without_io() {
        let wire = Scripted::default();
        let sink = CollectingSink::shared();
        let mut conn = connection(wire.clone(), &sink);
        conn.set_msg(&vec![0u8; MAX_SEND_PAYLOAD + 1]);
        let err = conn.send().expect_err("too large");
        assert!(matches!(err, BsockError::InsaneLength { .. }));
        assert!(wire.written().is_empty());
        assert_eq!(conn.errors(), 0);
        assert!(sink.contains("insane msglen=4000001"));
    }

    #[test]
    fn flow_control_refusal_is_reported_even_when_suppressed() {
        let wire = Scripted::default();
        let sink = CollectingSink::shared();
        let mut conn = connection(wire.clone(), &sink);
        conn.set_suppress_error_msgs(true);
        conn.install_send_hook(Box::new(|| false));
        conn.set_msg(b"x");
        assert!(matches!(conn.send(), Err(BsockError::FlowControl { .. })));
        assert!(sink.contains("Flowcontrol failure on Director daemon:dir:9101"));
        assert!(wire.written().is_empty());

        conn.uninstall_send_hook();
        conn.send().expect("hook removed");
    }

    #[test]
    fn terminate_signal_suppresses_later_messages() {
        let wire = Scripted::default();
        let sink = CollectingSink::shared();
        let mut conn = connection(wire.clone(), &sink);
        conn.signal(Signal::Terminate).expect("signal");
        assert_eq!(wire.written(), (-4i32).to_be_bytes());

        conn.close();
        assert!(matches!(conn.send(), Err(BsockError::Closed)));
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn swap_msgs_exchanges_buffers() {
        let sink = CollectingSink::shared();
        let mut conn = connection(Scripted::default(), &sink);
        conn.set_msg(b"first");
        let mut other = b"second".to_vec();
        conn.swap_msgs(&mut other);
        assert_eq!(other, b"first");
        assert_eq!(conn.msg(), b"second");
        assert_eq!(conn.msg.last(), Some(&0));
    }

    #[test]
    fn timer_does_not_outlive_stop() {
        let sink = CollectingSink::shared();
        let mut conn = connection(Scripted::default(), &sink);
        conn.start_timer(Duration::from_secs(15));
        assert!(conn.timer.is_some());
        conn.stop_timer();
        assert!(conn.timer.is_none());
    }
}
