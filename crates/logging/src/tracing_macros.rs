//! crates/logging/src/tracing_macros.rs
//! Convenience macros for bnet-specific tracing.
//!
//! These macros wrap the standard tracing macros with the targets used by the
//! transport subsystems, so filters such as `bnet::frame=trace` select one
//! subsystem without touching the others. Crates invoking them must depend
//! on `tracing` directly.

/// Emit a transport trace (send/recv bookkeeping, lifecycle changes).
///
/// # Example
/// ```ignore
/// trace_net!("closing {}", peer);
/// ```
#[macro_export]
macro_rules! trace_net {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "bnet::net", $($arg)*);
    };
}

/// Emit a connection establishment trace.
///
/// # Example
/// ```ignore
/// trace_connect!("trying {}", addr);
/// ```
#[macro_export]
macro_rules! trace_connect {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "bnet::connect", $($arg)*);
    };
}

/// Emit an authentication trace.
///
/// # Example
/// ```ignore
/// trace_auth!("cram-md5 challenge sent to {}", who);
/// ```
#[macro_export]
macro_rules! trace_auth {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "bnet::auth", $($arg)*);
    };
}

/// Emit a bandwidth limiter trace.
///
/// # Example
/// ```ignore
/// trace_limit!("sleeping {:?}", delay);
/// ```
#[macro_export]
macro_rules! trace_limit {
    ($($arg:tt)*) => {
        ::tracing::trace!(target: "bnet::bwlimit", $($arg)*);
    };
}

/// Emit a per-frame dump. Very verbose; only enable while debugging the wire.
///
/// # Example
/// ```ignore
/// trace_frame!("SEND {} bytes flags={:#x}", len, flags);
/// ```
#[macro_export]
macro_rules! trace_frame {
    ($($arg:tt)*) => {
        ::tracing::trace!(target: "bnet::frame", $($arg)*);
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn macros_expand_with_and_without_arguments() {
        trace_net!("plain");
        trace_connect!("host {}", "localhost");
        trace_auth!(who = "dir", "challenge sent");
        trace_limit!("{} bytes", 10);
        trace_frame!("SEND");
    }
}
