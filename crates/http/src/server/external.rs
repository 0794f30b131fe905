//! Bookkeeping for externally driven servers.
//!
//! The owner of such a server multiplexes its sockets with its own, so it needs
//! to know which descriptors the server waits on: the listener and every open
//! connection for reading, plus the connections currently writing a response.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Descriptors the server wants polled before its next [`run`](super::Server::run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub read: Vec<RawFd>,
    pub write: Vec<RawFd>,
}

impl Readiness {
    /// Highest descriptor in either set, `None` when both are empty.
    pub fn max_fd(&self) -> Option<RawFd> {
        self.read.iter().chain(self.write.iter()).copied().max()
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

#[derive(Debug)]
struct Entry {
    fd: RawFd,
    sending: Arc<AtomicBool>,
}

/// Open connections of an externally driven server.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    next_key: AtomicU64,
    entries: Mutex<HashMap<u64, Entry>>,
}

impl ConnectionRegistry {
    pub(crate) fn register<S: AsRawFd>(self: &Arc<Self>, socket: &S) -> Registration {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let sending = Arc::new(AtomicBool::new(false));
        let entry = Entry { fd: socket.as_raw_fd(), sending: Arc::clone(&sending) };
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(key, entry);
        Registration { key, sending, registry: Arc::clone(self) }
    }

    pub(crate) fn readiness(&self, listener: RawFd) -> Readiness {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut readiness = Readiness { read: Vec::with_capacity(entries.len() + 1), write: Vec::new() };
        readiness.read.push(listener);
        for entry in entries.values() {
            readiness.read.push(entry.fd);
            if entry.sending.load(Ordering::Acquire) {
                readiness.write.push(entry.fd);
            }
        }
        readiness
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Keeps a connection listed until dropped.
#[derive(Debug)]
pub(crate) struct Registration {
    key: u64,
    sending: Arc<AtomicBool>,
    registry: Arc<ConnectionRegistry>,
}

impl Registration {
    pub(crate) fn sending_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.sending)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}
