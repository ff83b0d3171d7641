//! Per-session message counters and replay protection.
//!
//! Each session direction gets its own counter state:
//!
//! - outbound: a strictly increasing counter starting at 1,
//! - inbound: a sliding replay window of the 32 counters below the
//!   highest value accepted so far (the floor), tracked as a bitmask.
//!
//! ```text
//!            floor
//!              v
//!  ... 08 09 0a | window bitmask (32 bits, bit 0 = floor - 1)
//!      rejected | seen-bits reject duplicates, clear bits accept
//! ```
//!
//! Counters above the floor always advance the window; counters at or
//! below `floor - 32` are rejected as replay or desync.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::error::{Result, WeaveError};
use crate::session::SessionHandle;

/// Width of the out-of-order acceptance window.
const WINDOW_BITS: u32 = 32;

/// Strictly increasing outbound counter.
#[derive(Debug, Clone, Copy)]
pub struct MessageCounter {
    next: u32,
}

impl MessageCounter {
    /// Fresh counter; the first value handed out is 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next value, advancing the counter.
    pub fn advance(&mut self) -> u32 {
        let value = self.next;
        self.next = self.next.wrapping_add(1);
        value
    }

    /// Value the next send will use, without advancing.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for MessageCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Inbound replay window for one peer direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerMessageCounter {
    /// Highest counter accepted so far; meaningful once `synced`.
    floor: u32,
    /// Bit `n` set means counter `floor - 1 - n` was accepted.
    window: u32,
    synced: bool,
}

impl PeerMessageCounter {
    /// Fresh window; the first verified counter becomes the baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept or reject a received counter, committing on acceptance.
    ///
    /// The first counter seen establishes the floor. After that, values
    /// above the floor shift the window forward; values within the window
    /// are accepted exactly once; values at or below the window are
    /// rejected as replay.
    pub fn verify_and_commit(&mut self, counter: u32) -> Result<()> {
        if !self.synced {
            self.floor = counter;
            self.window = 0;
            self.synced = true;
            trace!(counter, "replay window baselined");
            return Ok(());
        }
        if counter > self.floor {
            let delta = counter - self.floor;
            if delta > WINDOW_BITS {
                // Everything previously tracked falls out of the window.
                self.window = 0;
            } else if delta == WINDOW_BITS {
                // The old floor lands on the last slot; a plain shift by
                // the full width would both overflow and lose its bit.
                self.window = 1u32 << (WINDOW_BITS - 1);
            } else {
                self.window = (self.window << delta) | (1u32 << (delta - 1));
            }
            self.floor = counter;
            return Ok(());
        }
        if counter == self.floor {
            return Err(WeaveError::DuplicateCounter(counter));
        }
        let offset = self.floor - counter - 1;
        if offset >= WINDOW_BITS {
            warn!(counter, floor = self.floor, "counter below replay window");
            return Err(WeaveError::CounterOutOfWindow {
                counter,
                floor: self.floor,
            });
        }
        let bit = 1u32 << offset;
        if self.window & bit != 0 {
            return Err(WeaveError::DuplicateCounter(counter));
        }
        self.window |= bit;
        Ok(())
    }

    /// Highest counter accepted so far (0 before the first message).
    pub fn floor(&self) -> u32 {
        self.floor
    }
}

/// Counter state for one tracked session.
#[derive(Debug, Default)]
struct SessionCounters {
    send: MessageCounter,
    recv: PeerMessageCounter,
}

/// Counter bookkeeping for every live session.
#[derive(Debug, Default)]
pub struct MessageCounterManager {
    sessions: HashMap<SessionHandle, SessionCounters>,
}

impl MessageCounterManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a session; counters reset if it was tracked before.
    pub fn track(&mut self, handle: SessionHandle) {
        self.sessions.insert(handle, SessionCounters::default());
    }

    /// Stop tracking a session, dropping its counter state.
    pub fn untrack(&mut self, handle: &SessionHandle) {
        self.sessions.remove(handle);
    }

    /// Next outbound counter for a session.
    pub fn next_send(&mut self, handle: &SessionHandle) -> Result<u32> {
        let state = self
            .sessions
            .get_mut(handle)
            .ok_or(WeaveError::SessionNotFound)?;
        Ok(state.send.advance())
    }

    /// Verify a received counter against the session's replay window.
    pub fn verify_received(&mut self, handle: &SessionHandle, counter: u32) -> Result<()> {
        let state = self
            .sessions
            .get_mut(handle)
            .ok_or(WeaveError::SessionNotFound)?;
        state.recv.verify_and_commit(counter)
    }
}
