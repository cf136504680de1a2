//! State shared between a master connection and its duplicates.
//!
//! Every member registers a [`MemberStatus`] with the chain. Cancellation
//! walks the registered members under the chain lock, so it reaches
//! duplicates even while their owning threads are blocked in I/O. The
//! optional read/write locks are created by the master and shared by all
//! members.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use logging::trace_net;

/// Lifecycle flags of one chain member.
#[derive(Debug, Default)]
pub struct MemberStatus {
    closed: AtomicBool,
    terminated: AtomicBool,
    timed_out: AtomicBool,
    suppress_errors: AtomicBool,
    errors: AtomicU32,
}

impl MemberStatus {
    /// The member was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The member was terminated by a signal, a cancellation or a close.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// An I/O deadline expired or the member was canceled.
    pub fn is_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Acquire)
    }

    /// Job messages for this member are suppressed.
    pub fn errors_suppressed(&self) -> bool {
        self.suppress_errors.load(Ordering::Acquire)
    }

    /// Transport errors seen since the last connect.
    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::Acquire)
    }

    pub(crate) fn set_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn set_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub(crate) fn set_timed_out(&self, value: bool) {
        self.timed_out.store(value, Ordering::Release);
    }

    pub(crate) fn set_suppress_errors(&self, value: bool) {
        self.suppress_errors.store(value, Ordering::Release);
    }

    pub(crate) fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::AcqRel);
    }

    /// Clears everything for a fresh connection.
    pub(crate) fn reset(&self) {
        self.closed.store(false, Ordering::Release);
        self.terminated.store(false, Ordering::Release);
        self.timed_out.store(false, Ordering::Release);
        self.suppress_errors.store(false, Ordering::Release);
        self.errors.store(0, Ordering::Release);
    }
}

/// Read and write mutexes serialising concurrent users of a chain.
#[derive(Debug, Default)]
pub struct LockSet {
    read: Mutex<()>,
    write: Mutex<()>,
}

impl LockSet {
    pub(crate) fn lock_read(&self) -> MutexGuard<'_, ()> {
        self.read.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub(crate) fn lock_write(&self) -> MutexGuard<'_, ()> {
        self.write.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Members and locks of one master and its duplicates.
#[derive(Debug, Default)]
pub struct Chain {
    members: Mutex<Vec<Weak<MemberStatus>>>,
    locks: Mutex<Option<Arc<LockSet>>>,
}

impl Chain {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn members(&self) -> MutexGuard<'_, Vec<Weak<MemberStatus>>> {
        self.members
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub(crate) fn register(&self, status: &Arc<MemberStatus>) {
        let mut members = self.members();
        members.retain(|member| member.strong_count() > 0);
        members.push(Arc::downgrade(status));
    }

    /// Marks every open member terminated and timed out.
    pub fn cancel(&self) {
        let members = self.members();
        let mut marked = 0usize;
        for status in members.iter().filter_map(Weak::upgrade) {
            if !status.is_closed() {
                status.set_terminated();
                status.set_timed_out(true);
                marked += 1;
            }
        }
        trace_net!(marked, "chain canceled");
    }

    /// Number of live members, master included.
    pub fn len(&self) -> usize {
        self.members()
            .iter()
            .filter(|member| member.strong_count() > 0)
            .count()
    }

    /// Reports whether no member is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn lockset(&self) -> Option<Arc<LockSet>> {
        self.locks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Installs the locks. Returns `false` when they already exist.
    pub(crate) fn enable_locking(&self) -> bool {
        let mut locks = self.locks.lock().unwrap_or_else(|poison| poison.into_inner());
        if locks.is_some() {
            return false;
        }
        *locks = Some(Arc::new(LockSet::default()));
        true
    }

    pub(crate) fn disable_locking(&self) {
        self.locks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
    }

    /// Reports whether locking is enabled.
    pub fn is_locking(&self) -> bool {
        self.lockset().is_some()
    }
}

/// Cloneable handle that cancels a chain from any thread.
///
/// Cancellation only sets flags. A member blocked in a system call notices
/// when the call returns or its deadline expires.
#[derive(Clone, Debug)]
pub struct Canceller {
    chain: Arc<Chain>,
}

impl Canceller {
    pub(crate) const fn new(chain: Arc<Chain>) -> Self {
        Self { chain }
    }

    /// Cancels every member of the chain.
    pub fn cancel(&self) {
        self.chain.cancel();
    }
}
