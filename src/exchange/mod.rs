//! Exchange multiplexing.
//!
//! An exchange is one request/response conversation multiplexed over a
//! secure session. The manager owns the session manager: inbound frames
//! enter at [`ExchangeManager::on_message_received`], get opened and
//! replay-checked by the session layer, and are then dispatched to the
//! delegate of the matching exchange. Messages for an id with no open
//! exchange are dropped and logged.
//!
//! Timeouts are cooperative: callers register a deadline with
//! [`ExchangeManager::expect_response`] and drive
//! [`ExchangeManager::poll_timeouts`] from their own timer.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{Result, WeaveError};
use crate::session::{PayloadHeader, PeerAddress, SecureSessionManager, SessionHandle};

/// Identifier of one exchange, unique among the session's open exchanges.
pub type ExchangeId = u16;

/// Stable identity of one open exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeHandle {
    /// Session the exchange runs over.
    pub session: SessionHandle,
    /// Exchange id within that session.
    pub id: ExchangeId,
}

/// Application hooks for one exchange.
pub trait ExchangeDelegate {
    /// A message addressed to this exchange arrived and passed all checks.
    fn on_message_received(&mut self, handle: ExchangeHandle, message_type: u8, payload: &[u8]);

    /// The response deadline passed; the exchange is closing.
    fn on_response_timeout(&mut self, handle: ExchangeHandle);

    /// The exchange closed (explicitly, after timeout, or at shutdown).
    fn on_exchange_closed(&mut self, handle: ExchangeHandle);
}

struct ExchangeState {
    delegate: Box<dyn ExchangeDelegate>,
    /// True when this node opened the exchange.
    initiator: bool,
    deadline: Option<Instant>,
}

/// Owner of all open exchanges and the session layer below them.
pub struct ExchangeManager {
    sessions: SecureSessionManager,
    exchanges: HashMap<ExchangeHandle, ExchangeState>,
    next_exchange_id: ExchangeId,
    max_exchanges: usize,
    shutting_down: bool,
}

impl std::fmt::Debug for ExchangeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeManager")
            .field("exchanges", &self.exchanges.len())
            .field("shutting_down", &self.shutting_down)
            .finish_non_exhaustive()
    }
}

impl ExchangeManager {
    /// Take ownership of the session layer and start with no exchanges.
    pub fn new(sessions: SecureSessionManager, max_exchanges: usize) -> Self {
        Self {
            sessions,
            exchanges: HashMap::new(),
            next_exchange_id: 1,
            max_exchanges,
            shutting_down: false,
        }
    }

    /// Session layer, for pairing and fabric administration.
    pub fn sessions(&self) -> &SecureSessionManager {
        &self.sessions
    }

    /// Mutable session layer.
    pub fn sessions_mut(&mut self) -> &mut SecureSessionManager {
        &mut self.sessions
    }

    /// Number of open exchanges.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }

    /// Open a new exchange on a session, as initiator.
    ///
    /// The assigned id is unique among the session's open exchanges.
    pub fn new_context(
        &mut self,
        session: SessionHandle,
        delegate: Box<dyn ExchangeDelegate>,
    ) -> Result<ExchangeHandle> {
        if self.shutting_down {
            return Err(WeaveError::ShuttingDown);
        }
        if !self.sessions.contains_session(&session) {
            return Err(WeaveError::SessionNotFound);
        }
        if self.exchanges.len() >= self.max_exchanges {
            warn!(max = self.max_exchanges, "exchange table full");
            return Err(WeaveError::TableFull);
        }
        let handle = ExchangeHandle {
            session,
            id: self.allocate_id(session),
        };
        self.exchanges.insert(
            handle,
            ExchangeState {
                delegate,
                initiator: true,
                deadline: None,
            },
        );
        debug!(exchange = handle.id, peer = session.peer_node_id, "exchange opened");
        Ok(handle)
    }

    /// Send a message on an open exchange.
    pub fn send_message(
        &mut self,
        handle: &ExchangeHandle,
        message_type: u8,
        payload: &[u8],
    ) -> Result<()> {
        let state = self
            .exchanges
            .get(handle)
            .ok_or(WeaveError::ExchangeNotFound)?;
        let header = PayloadHeader::new(handle.id, message_type, state.initiator);
        let mut plaintext = Vec::with_capacity(PayloadHeader::LEN + payload.len());
        plaintext.extend_from_slice(&header.to_bytes());
        plaintext.extend_from_slice(payload);
        self.sessions.send_message(&handle.session, &plaintext)
    }

    /// Arm the response deadline for an exchange.
    pub fn expect_response(&mut self, handle: &ExchangeHandle, deadline: Instant) -> Result<()> {
        let state = self
            .exchanges
            .get_mut(handle)
            .ok_or(WeaveError::ExchangeNotFound)?;
        state.deadline = Some(deadline);
        Ok(())
    }

    /// Fire and close every exchange whose deadline has passed.
    pub fn poll_timeouts(&mut self, now: Instant) {
        let expired: Vec<ExchangeHandle> = self
            .exchanges
            .iter()
            .filter(|(_, s)| s.deadline.is_some_and(|d| d <= now))
            .map(|(h, _)| *h)
            .collect();
        for handle in expired {
            if let Some(mut state) = self.exchanges.remove(&handle) {
                warn!(exchange = handle.id, "response deadline passed");
                state.delegate.on_response_timeout(handle);
                state.delegate.on_exchange_closed(handle);
            }
        }
    }

    /// Feed one received frame through session opening and dispatch.
    ///
    /// Frames that fail authentication or replay checks error out here;
    /// authenticated messages with no matching exchange are dropped with
    /// a log line and are not an error.
    pub fn on_message_received(&mut self, src: PeerAddress, frame: &[u8]) -> Result<()> {
        let (session, plaintext) = self.sessions.receive(src, frame)?;
        let (header, payload) = PayloadHeader::from_bytes(&plaintext)?;
        let handle = ExchangeHandle {
            session,
            id: header.exchange_id,
        };
        match self.exchanges.get_mut(&handle) {
            // The peer's initiator flag must be the opposite of ours,
            // otherwise two exchanges with the same id could cross-talk.
            Some(state) if state.initiator != header.is_initiator() => {
                state.deadline = None;
                state
                    .delegate
                    .on_message_received(handle, header.message_type, payload);
                Ok(())
            }
            _ => {
                warn!(
                    exchange = header.exchange_id,
                    peer = session.peer_node_id,
                    message_type = header.message_type,
                    "message for unknown exchange dropped"
                );
                Ok(())
            }
        }
    }

    /// Close one exchange, notifying its delegate.
    pub fn close(&mut self, handle: &ExchangeHandle) -> Result<()> {
        let mut state = self
            .exchanges
            .remove(handle)
            .ok_or(WeaveError::ExchangeNotFound)?;
        state.delegate.on_exchange_closed(*handle);
        debug!(exchange = handle.id, "exchange closed");
        Ok(())
    }

    /// Close every exchange and refuse new ones.
    ///
    /// Each delegate sees exactly one `on_exchange_closed`; nothing is
    /// delivered after shutdown returns.
    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        let open: Vec<ExchangeHandle> = self.exchanges.keys().copied().collect();
        for handle in open {
            if let Some(mut state) = self.exchanges.remove(&handle) {
                state.delegate.on_exchange_closed(handle);
            }
        }
        info!("exchange manager shut down");
    }

    fn allocate_id(&mut self, session: SessionHandle) -> ExchangeId {
        loop {
            let id = self.next_exchange_id;
            self.next_exchange_id = self.next_exchange_id.wrapping_add(1).max(1);
            let candidate = ExchangeHandle { session, id };
            if !self.exchanges.contains_key(&candidate) {
                return id;
            }
        }
    }
}
