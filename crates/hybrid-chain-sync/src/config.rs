//! Replication configuration.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// First port handed out by a default allocator.
pub const DEFAULT_START_PORT: u16 = 6001;

/// Hands out listening ports in sequence.
///
/// Clones share one counter, so every transport built from the same
/// configuration (or a clone of it) gets a distinct port. Scope one
/// allocator per process or per test run.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    next: Arc<AtomicU16>,
}

impl PortAllocator {
    /// Start allocating at `start`.
    pub fn starting_at(start: u16) -> Self {
        Self {
            next: Arc::new(AtomicU16::new(start)),
        }
    }

    /// Take the next port. Port 0 (OS-assigned) is handed out unchanged.
    pub fn next_port(&self) -> u16 {
        if self.next.load(Ordering::SeqCst) == 0 {
            return 0;
        }
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The port the next call will return.
    pub fn peek(&self) -> u16 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::starting_at(DEFAULT_START_PORT)
    }
}

/// Configuration for replication transports.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Host the TCP listener binds to.
    pub listen_host: String,
    /// Source of listening ports.
    pub ports: PortAllocator,
    /// Buffer size of each inbound and per-peer outbound queue.
    pub channel_capacity: usize,
    /// Longest incoming line accepted as a frame.
    pub max_frame_bytes: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            ports: PortAllocator::default(),
            channel_capacity: 1024,
            max_frame_bytes: 1 << 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_sequential_and_shared() {
        let ports = PortAllocator::default();
        let clone = ports.clone();
        assert_eq!(ports.next_port(), 6001);
        assert_eq!(clone.next_port(), 6002);
        assert_eq!(ports.peek(), 6003);
    }

    #[test]
    fn test_independent_allocators() {
        let a = PortAllocator::starting_at(7000);
        let b = PortAllocator::starting_at(7000);
        assert_eq!(a.next_port(), 7000);
        assert_eq!(b.next_port(), 7000);
    }

    #[test]
    fn test_zero_means_os_assigned() {
        let ports = PortAllocator::starting_at(0);
        assert_eq!(ports.next_port(), 0);
        assert_eq!(ports.next_port(), 0);
    }
}
