//! Secure session management.
//!
//! A session is the unit of frame protection between this node and one
//! peer: directional keys derived from an externally negotiated pairing,
//! plus per-session message counters. The manager owns the fabric table
//! (sessions are scoped to a fabric membership) and a [`Transport`] sink
//! for outbound frames.
//!
//! Key establishment itself (the pairing handshake) happens outside this
//! crate; callers hand the finished [`PairingState`] to
//! [`SecureSessionManager::new_pairing`].

pub mod crypto;
pub mod packet;

pub use crypto::{AeadSessionCrypto, SessionCrypto, SessionKeys};
pub use packet::{PacketHeader, PayloadHeader};

use std::collections::HashMap;
use std::net::SocketAddr;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::counter::MessageCounterManager;
use crate::error::{Result, WeaveError};
use crate::fabric::{FabricIndex, FabricTable, NodeId};

/// Session key identifier negotiated during pairing.
pub type KeyId = u16;

/// Network address of a peer.
pub type PeerAddress = SocketAddr;

/// Which side of the pairing this node was.
///
/// The role only selects which derived key protects which direction;
/// both sides are equal afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// This node started the pairing.
    Initiator,
    /// This node answered the pairing.
    Responder,
}

/// Stable identity of one session.
///
/// Sessions are keyed by the peer's identity, the key id the peer
/// negotiated, and the fabric the session lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    /// Peer's operational node id.
    pub peer_node_id: NodeId,
    /// Key id the peer selected for frames it receives.
    pub peer_key_id: KeyId,
    /// Fabric membership the session is scoped to.
    pub fabric_index: FabricIndex,
}

impl SessionHandle {
    /// Assemble a handle from its three components.
    pub fn new(peer_node_id: NodeId, peer_key_id: KeyId, fabric_index: FabricIndex) -> Self {
        Self {
            peer_node_id,
            peer_key_id,
            fabric_index,
        }
    }
}

/// Result of an external pairing handshake.
#[derive(Clone)]
pub struct PairingState {
    /// Key id this node selected; peers put it in frames they send us.
    pub local_key_id: KeyId,
    /// Key id the peer selected; goes into frames we send.
    pub peer_key_id: KeyId,
    /// Shared secret the directional keys are derived from.
    pub secret: Vec<u8>,
}

impl std::fmt::Debug for PairingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingState")
            .field("local_key_id", &self.local_key_id)
            .field("peer_key_id", &self.peer_key_id)
            .finish_non_exhaustive()
    }
}

/// Live state of one secure session.
#[derive(Debug)]
struct SecureSession {
    peer_addr: PeerAddress,
    role: SessionRole,
    local_key_id: KeyId,
    keys: SessionKeys,
}

impl SecureSession {
    fn send_key(&self) -> &[u8; crypto::KEY_LEN] {
        match self.role {
            SessionRole::Initiator => &self.keys.i2r,
            SessionRole::Responder => &self.keys.r2i,
        }
    }

    fn recv_key(&self) -> &[u8; crypto::KEY_LEN] {
        match self.role {
            SessionRole::Initiator => &self.keys.r2i,
            SessionRole::Responder => &self.keys.i2r,
        }
    }
}

/// Outbound frame sink.
pub trait Transport {
    /// Hand one encoded frame to the network.
    fn send_to(&mut self, dest: PeerAddress, frame: &[u8]) -> Result<()>;
}

/// Owner of all live secure sessions.
pub struct SecureSessionManager {
    local_node_id: NodeId,
    fabrics: FabricTable,
    sessions: HashMap<SessionHandle, SecureSession>,
    by_local_key: HashMap<KeyId, SessionHandle>,
    counters: MessageCounterManager,
    crypto: Box<dyn SessionCrypto>,
    transport: Box<dyn Transport>,
    max_sessions: usize,
}

impl std::fmt::Debug for SecureSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSessionManager")
            .field("local_node_id", &self.local_node_id)
            .field("sessions", &self.sessions.len())
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

impl SecureSessionManager {
    /// Create a manager for one local node.
    pub fn new(
        local_node_id: NodeId,
        fabrics: FabricTable,
        crypto: Box<dyn SessionCrypto>,
        transport: Box<dyn Transport>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            local_node_id,
            fabrics,
            sessions: HashMap::new(),
            by_local_key: HashMap::new(),
            counters: MessageCounterManager::new(),
            crypto,
            transport,
            max_sessions: config.max_sessions,
        }
    }

    /// This node's operational id.
    pub fn local_node_id(&self) -> NodeId {
        self.local_node_id
    }

    /// Fabric membership table.
    pub fn fabrics(&self) -> &FabricTable {
        &self.fabrics
    }

    /// Mutable fabric membership table.
    pub fn fabrics_mut(&mut self) -> &mut FabricTable {
        &mut self.fabrics
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Install a session from a finished pairing.
    ///
    /// The fabric must exist, the (peer, key id, fabric) triple must be
    /// new, and a free session slot must remain.
    pub fn new_pairing(
        &mut self,
        peer_addr: PeerAddress,
        peer_node_id: NodeId,
        fabric_index: FabricIndex,
        role: SessionRole,
        pairing: &PairingState,
    ) -> Result<SessionHandle> {
        if self.fabrics.find(fabric_index).is_none() {
            return Err(WeaveError::UnknownFabric(fabric_index));
        }
        let handle = SessionHandle::new(peer_node_id, pairing.peer_key_id, fabric_index);
        if self.sessions.contains_key(&handle) {
            return Err(WeaveError::DuplicateSession);
        }
        // A reused local key id would hijack inbound routing for the
        // session that already owns it.
        if self.by_local_key.contains_key(&pairing.local_key_id) {
            warn!(
                key_id = pairing.local_key_id,
                "local key id already routes to a live session"
            );
            return Err(WeaveError::DuplicateSession);
        }
        if self.sessions.len() >= self.max_sessions {
            warn!(max = self.max_sessions, "session table full");
            return Err(WeaveError::TableFull);
        }
        let keys = self.crypto.derive_keys(&pairing.secret)?;
        self.sessions.insert(
            handle,
            SecureSession {
                peer_addr,
                role,
                local_key_id: pairing.local_key_id,
                keys,
            },
        );
        self.by_local_key.insert(pairing.local_key_id, handle);
        self.counters.track(handle);
        info!(
            peer = peer_node_id,
            key_id = pairing.peer_key_id,
            fabric = fabric_index,
            ?role,
            "secure session established"
        );
        Ok(handle)
    }

    /// Handle of a live session with the peer on the given fabric.
    pub fn get_session_handle(
        &self,
        peer_node_id: NodeId,
        fabric_index: FabricIndex,
    ) -> Option<SessionHandle> {
        self.sessions
            .keys()
            .find(|h| h.peer_node_id == peer_node_id && h.fabric_index == fabric_index)
            .copied()
    }

    /// True when the handle refers to a live session.
    pub fn contains_session(&self, handle: &SessionHandle) -> bool {
        self.sessions.contains_key(handle)
    }

    /// Peer address of a live session.
    pub fn peer_address(&self, handle: &SessionHandle) -> Option<PeerAddress> {
        self.sessions.get(handle).map(|s| s.peer_addr)
    }

    /// Seal a payload and hand the frame to the transport.
    ///
    /// The payload must already start with its [`PayloadHeader`]; this
    /// layer adds the counter, the clear packet header, and the seal.
    pub fn send_message(&mut self, handle: &SessionHandle, payload: &[u8]) -> Result<()> {
        let session = self
            .sessions
            .get(handle)
            .ok_or(WeaveError::SessionNotFound)?;
        let counter = self.counters.next_send(handle)?;
        let header = PacketHeader {
            version: packet::PACKET_VERSION,
            key_id: handle.peer_key_id,
            counter,
        };
        let aad = header.to_bytes();
        let sealed = self.crypto.seal(session.send_key(), counter, &aad, payload)?;

        let mut frame = Vec::with_capacity(PacketHeader::LEN + sealed.len());
        frame.extend_from_slice(&aad);
        frame.extend_from_slice(&sealed);
        self.transport.send_to(session.peer_addr, &frame)
    }

    /// Open a received frame.
    ///
    /// Authenticates and decrypts, then checks the replay window; only a
    /// frame that passes both is returned for dispatch.
    pub fn receive(&mut self, src: PeerAddress, frame: &[u8]) -> Result<(SessionHandle, Vec<u8>)> {
        let header = PacketHeader::from_bytes(frame)?;
        let handle = *self
            .by_local_key
            .get(&header.key_id)
            .ok_or(WeaveError::SessionNotFound)?;
        let session = self
            .sessions
            .get(&handle)
            .ok_or(WeaveError::SessionNotFound)?;
        let aad = &frame[..PacketHeader::LEN];
        let plaintext = self.crypto.open(
            session.recv_key(),
            header.counter,
            aad,
            &frame[PacketHeader::LEN..],
        )?;
        self.counters.verify_received(&handle, header.counter)?;
        debug!(
            peer = handle.peer_node_id,
            counter = header.counter,
            %src,
            "frame accepted"
        );
        Ok((handle, plaintext))
    }

    /// Tear down a session; unknown handles are a no-op.
    pub fn remove_session(&mut self, handle: &SessionHandle) {
        if let Some(session) = self.sessions.remove(handle) {
            // Drop the routing entry only if this session still owns it.
            if self.by_local_key.get(&session.local_key_id) == Some(handle) {
                self.by_local_key.remove(&session.local_key_id);
            }
            self.counters.untrack(handle);
            debug!(peer = handle.peer_node_id, "session removed");
        }
    }
}
