//! Socket readiness plumbing.
//!
//! The core never touches sockets itself; transport implementations
//! register their descriptors with whatever event loop drives the
//! process through the [`SocketWatcher`] capability. The watcher is a
//! strategy object: handing a different implementation to a transport
//! retargets it to a different event loop without touching transport
//! code.

use std::os::raw::c_int;

/// Raw socket descriptor a watcher tracks.
pub type SocketFd = c_int;

/// Readiness event bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SocketEvents(u8);

impl SocketEvents {
    /// Readable.
    pub const READ: SocketEvents = SocketEvents(0x01);
    /// Writable.
    pub const WRITE: SocketEvents = SocketEvents(0x02);
    /// Exceptional condition.
    pub const EXCEPT: SocketEvents = SocketEvents(0x04);
    /// Error condition.
    pub const ERROR: SocketEvents = SocketEvents(0x08);

    /// Empty set.
    pub fn none() -> Self {
        Self(0)
    }

    /// True when any bit of `other` is present.
    pub fn has(self, other: SocketEvents) -> bool {
        self.0 & other.0 != 0
    }

    /// Union with `other`.
    pub fn set(&mut self, other: SocketEvents) {
        self.0 |= other.0;
    }

    /// Remove the bits of `other`.
    pub fn clear(&mut self, other: SocketEvents) {
        self.0 &= !other.0;
    }

    /// Remove everything.
    pub fn clear_all(&mut self) {
        self.0 = 0;
    }

    /// Raw bit pattern.
    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Event-loop capability a transport registers its sockets with.
///
/// Implementations translate these calls onto their own readiness
/// machinery (`select`, `epoll`, a test harness queue). Callback
/// requests are level-style: they stay in force until cleared.
pub trait SocketWatcher {
    /// A transport took ownership of `fd` and will expect callbacks.
    fn on_attach(&mut self, fd: SocketFd);

    /// Deliver read-readiness callbacks for `fd`.
    fn request_callback_on_pending_read(&mut self, fd: SocketFd);

    /// Deliver write-readiness callbacks for `fd`.
    fn request_callback_on_pending_write(&mut self, fd: SocketFd);

    /// Stop read-readiness callbacks for `fd`.
    fn clear_callback_on_pending_read(&mut self, fd: SocketFd);

    /// Stop write-readiness callbacks for `fd`.
    fn clear_callback_on_pending_write(&mut self, fd: SocketFd);

    /// The transport released `fd`; no callbacks may follow.
    fn on_release(&mut self, fd: SocketFd);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bits() {
        assert_eq!(SocketEvents::READ.bits(), 0x01);
        assert_eq!(SocketEvents::WRITE.bits(), 0x02);
        assert_eq!(SocketEvents::EXCEPT.bits(), 0x04);
        assert_eq!(SocketEvents::ERROR.bits(), 0x08);
    }

    #[test]
    fn test_set_has_clear() {
        let mut ev = SocketEvents::none();
        assert!(!ev.has(SocketEvents::READ));

        ev.set(SocketEvents::READ);
        ev.set(SocketEvents::ERROR);
        assert!(ev.has(SocketEvents::READ));
        assert!(ev.has(SocketEvents::ERROR));
        assert!(!ev.has(SocketEvents::WRITE));

        ev.clear(SocketEvents::READ);
        assert!(!ev.has(SocketEvents::READ));
        assert!(ev.has(SocketEvents::ERROR));

        ev.clear_all();
        assert_eq!(ev, SocketEvents::none());
    }

    struct RecordingWatcher {
        calls: Vec<(&'static str, SocketFd)>,
    }

    impl SocketWatcher for RecordingWatcher {
        fn on_attach(&mut self, fd: SocketFd) {
            self.calls.push(("attach", fd));
        }
        fn request_callback_on_pending_read(&mut self, fd: SocketFd) {
            self.calls.push(("req_read", fd));
        }
        fn request_callback_on_pending_write(&mut self, fd: SocketFd) {
            self.calls.push(("req_write", fd));
        }
        fn clear_callback_on_pending_read(&mut self, fd: SocketFd) {
            self.calls.push(("clear_read", fd));
        }
        fn clear_callback_on_pending_write(&mut self, fd: SocketFd) {
            self.calls.push(("clear_write", fd));
        }
        fn on_release(&mut self, fd: SocketFd) {
            self.calls.push(("release", fd));
        }
    }

    #[test]
    fn test_watcher_lifecycle_order() {
        let mut w = RecordingWatcher { calls: Vec::new() };
        w.on_attach(3);
        w.request_callback_on_pending_read(3);
        w.clear_callback_on_pending_read(3);
        w.on_release(3);
        assert_eq!(
            w.calls,
            vec![("attach", 3), ("req_read", 3), ("clear_read", 3), ("release", 3)]
        );
    }
}
