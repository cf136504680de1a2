//! Outbound connection establishment with retry.
//!
//! [`Bsock::open`] makes one pass over the resolved addresses of a host;
//! [`Bsock::connect`] repeats that pass until it succeeds, a fatal error is
//! hit, the owning job is canceled or the retry budget runs out.

use std::collections::HashSet;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use logging::{JobMessageSink, MessageType, trace_connect};
use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, TcpKeepalive, Type};

use crate::bsock::Bsock;
use crate::config::{BsockOptions, ConnectConfig};
use crate::error::BsockError;
use crate::job::JobControl;
use crate::peer::PeerIdentity;

/// Counter value, in milliseconds, after which a verbose retry loop warns
/// again.
const RETRY_WARNING_PERIOD_MS: i64 = 300_000;

/// Slice used while sleeping between attempts, so cancellation is noticed
/// without waiting out the whole interval.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Resolves `host` and drops duplicate addresses, keeping the first
/// occurrence of each.
pub fn resolve_addresses(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let resolved: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if resolved.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("host '{host}' did not resolve to any addresses"),
        ));
    }
    Ok(dedupe_addresses(resolved))
}

/// Removes repeated addresses while preserving order.
pub fn dedupe_addresses(addresses: Vec<SocketAddr>) -> Vec<SocketAddr> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .into_iter()
        .filter(|addr| seen.insert(*addr))
        .collect()
}

/// Socket creation errors that only mean "this address family is not
/// available here"; the next candidate is tried without a message.
fn is_unsupported_family(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EAFNOSUPPORT | libc::EPROTONOSUPPORT | libc::EPROTOTYPE)
    )
}

fn family_number(addr: &SocketAddr) -> i32 {
    if addr.is_ipv4() {
        libc::AF_INET
    } else {
        libc::AF_INET6
    }
}

impl Bsock {
    /// Makes one connection attempt to `host:port`.
    ///
    /// Every resolved address is tried in order. Resolution failures and
    /// socket errors other than an unsupported address family are fatal;
    /// connect failures are retryable and reported as
    /// [`BsockError::Connect`] carrying the last OS error.
    pub fn open(
        config: &ConnectConfig,
        name: &str,
        host: &str,
        port: u16,
        options: BsockOptions,
    ) -> Result<Self, BsockError> {
        let deadline = (!config.max_retry_time.is_zero())
            .then(|| Instant::now() + config.max_retry_time);
        open_once(config, name, host, port, options, deadline)
    }

    /// Connects to `host:port`, retrying every `retry_interval` until
    /// `max_retry_time` has elapsed.
    ///
    /// A verbose loop warns on the first retry and then every five minutes.
    /// When the budget runs out a fatal "Unable to connect" job message is
    /// emitted. A canceled job stops the loop with
    /// [`BsockError::Canceled`].
    pub fn connect(
        config: &ConnectConfig,
        name: &str,
        host: &str,
        port: u16,
        options: BsockOptions,
    ) -> Result<Self, BsockError> {
        let begin = Instant::now();
        let stop_at = begin + config.max_retry_time;
        // A zero budget still allows one pass, it just leaves the sockets
        // without a connect timeout.
        let deadline = (!config.max_retry_time.is_zero()).then_some(stop_at);
        let retry_ms = i64::try_from(config.retry_interval.as_millis()).unwrap_or(i64::MAX);
        let sink = options.sink.clone();
        let job = options.job.clone();
        let mut countdown: i64 = 0;

        loop {
            let err = match open_once(config, name, host, port, options.clone(), deadline) {
                Ok(bsock) => return Ok(bsock),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if job.is_canceled() {
                return Err(BsockError::Canceled);
            }
            trace_connect!(name, host, port, error = %err, "connect attempt failed");
            if countdown < 0 {
                countdown = RETRY_WARNING_PERIOD_MS;
                if config.verbose {
                    sink.emit(
                        MessageType::Warning,
                        &format!(
                            "Could not connect to {name} on {host}:{port}. ERR={}\nRetrying ...",
                            source_text(&err)
                        ),
                    );
                }
            }

            if !sleep_unless_canceled(config.retry_interval, stop_at, job.as_ref()) {
                return Err(BsockError::Canceled);
            }
            if stop_at <= Instant::now() {
                sink.emit(MessageType::Fatal, &err.to_string());
                return Err(err);
            }
            countdown = countdown.saturating_sub(retry_ms);
        }
    }
}

fn source_text(err: &BsockError) -> String {
    match err {
        BsockError::Connect { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}

/// Sleeps `interval`, capped at `deadline`, in short slices. Returns `false`
/// when the job was canceled meanwhile.
fn sleep_unless_canceled(interval: Duration, deadline: Instant, job: &dyn JobControl) -> bool {
    let wake = (Instant::now() + interval).min(deadline);
    loop {
        if job.is_canceled() {
            return false;
        }
        let now = Instant::now();
        if now >= wake {
            return true;
        }
        thread::sleep((wake - now).min(CANCEL_POLL));
    }
}

fn open_once(
    config: &ConnectConfig,
    name: &str,
    host: &str,
    port: u16,
    options: BsockOptions,
    deadline: Option<Instant>,
) -> Result<Bsock, BsockError> {
    let sink = options.sink.clone();
    let candidates = resolve_addresses(host, port).map_err(|source| {
        let err = BsockError::Resolve {
            host: host.to_owned(),
            source,
        };
        sink.emit(MessageType::Error, &err.to_string());
        err
    })?;

    let mut fatal: Option<BsockError> = None;
    let mut last_error: Option<io::Error> = None;

    for candidate in candidates {
        trace_connect!(%candidate, name, "trying address");
        let socket = match Socket::new(Domain::for_address(candidate), Type::STREAM, Some(Protocol::TCP)) {
            Ok(socket) => socket,
            Err(err) if is_unsupported_family(&err) => {
                last_error = Some(err);
                continue;
            }
            Err(source) => {
                let err = BsockError::SocketOpen {
                    proto: family_number(&candidate),
                    port,
                    source,
                };
                sink.emit(MessageType::Error, &err.to_string());
                fatal = Some(err);
                continue;
            }
        };

        if let Some(source_addr) = config.source_address {
            if let Err(source) = socket.bind(&SockAddr::from(source_addr)) {
                let err = BsockError::SourceBind {
                    proto: family_number(&source_addr),
                    source,
                };
                sink.emit(MessageType::Error, &err.to_string());
                fatal = Some(err);
                continue;
            }
        }

        enable_keepalive(&socket, config.heartbeat_interval, sink.as_ref());

        let target = SockAddr::from(candidate);
        let attempt = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    Err(io::Error::from(io::ErrorKind::TimedOut))
                } else {
                    socket.connect_timeout(&target, remaining)
                }
            }
            None => socket.connect(&target),
        };
        if let Err(err) = attempt {
            trace_connect!(%candidate, error = %err, "connect failed");
            last_error = Some(err);
            continue;
        }

        if let Err(err) = socket.set_keepalive(true) {
            sink.emit(
                MessageType::Warning,
                &format!("Cannot set SO_KEEPALIVE on socket: {err}"),
            );
        }
        let stream: TcpStream = socket.into();
        trace_connect!(%candidate, name, host, port, "connected");
        return Ok(Bsock::from_transport(
            Box::new(stream),
            PeerIdentity::new(name, host, port),
            options,
        ));
    }

    if let Some(err) = fatal {
        return Err(err);
    }
    Err(BsockError::Connect {
        name: name.to_owned(),
        host: host.to_owned(),
        port,
        source: last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)),
    })
}

fn enable_keepalive(socket: &Socket, heartbeat: Duration, sink: &dyn JobMessageSink) {
    if let Err(err) = socket.set_keepalive(true) {
        sink.emit(
            MessageType::Warning,
            &format!("Cannot set SO_KEEPALIVE on socket: {err}"),
        );
    }
    if !heartbeat.is_zero() {
        let keepalive = TcpKeepalive::new().with_time(heartbeat);
        if let Err(err) = SockRef::from(socket).set_tcp_keepalive(&keepalive) {
            sink.emit(
                MessageType::Warning,
                &format!("Cannot set TCP_KEEPIDLE on socket: {err}"),
            );
        }
    }
}
