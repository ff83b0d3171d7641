//! Weave protocol error types.
//!
//! Errors fall into four classes, and callers are expected to treat them
//! differently:
//!
//! - **Malformed encoding**: bad tag type, duplicate tag, truncated
//!   container. Always detected locally. [`WeaveError::Malformed`] carries
//!   the message type name so logs identify exactly which schema failed.
//! - **Not found**: absent optional field, unmatched exchange id, stale
//!   session handle. Recoverable; the caller decides severity.
//! - **Resource exhaustion**: full fabric table, session/exchange limits.
//!   Surfaced, never a panic.
//! - **Security**: replay-window violations, failed frame authentication.
//!   The offending message is discarded; there is no automatic retry.

use thiserror::Error;

/// Weave protocol errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeaveError {
    /// Element carries a tag the current context does not allow, or a tag
    /// number repeated at the same nesting level.
    #[error("Invalid element tag")]
    InvalidTag,

    /// Element wire type does not match what the schema or getter expects.
    #[error("Wrong element type")]
    WrongElementType,

    /// Input ended inside an element or an unterminated container.
    #[error("Unexpected end of encoded input")]
    UnexpectedEnd,

    /// Cursor reached the end of the current container.
    ///
    /// Iteration uses this as its stop signal; it only escalates into a
    /// real error when a getter required the element to exist.
    #[error("End of container")]
    EndOfContainer,

    /// Container open/close bookkeeping went wrong (unbalanced
    /// `end_container`, finalize with containers still open).
    #[error("Container open/close mismatch")]
    ContainerMismatch,

    /// A message failed schema validation; the payload names the message
    /// type so callers can log precisely.
    #[error("Malformed {0}")]
    Malformed(&'static str),

    /// Requested element is not present in the bound container.
    #[error("Element not found")]
    NotFound,

    /// Fabric index is outside the table or every slot is taken.
    #[error("Table full")]
    TableFull,

    /// Fabric index is already bound to a different node identity.
    #[error("Fabric index {0} bound to another node")]
    FabricIndexInUse(u8),

    /// Fabric index has no membership assigned.
    #[error("Unknown fabric index {0}")]
    UnknownFabric(u8),

    /// No session matches the handle (evicted, or never paired).
    #[error("Session not found")]
    SessionNotFound,

    /// A pairing already exists for this (peer, key id, fabric) triple.
    #[error("Duplicate session pairing")]
    DuplicateSession,

    /// No open exchange matches the handle.
    #[error("Exchange not found")]
    ExchangeNotFound,

    /// Received message counter is below the replay window.
    #[error("Message counter {counter} outside replay window (floor {floor})")]
    CounterOutOfWindow {
        /// Counter carried by the rejected message.
        counter: u32,
        /// Highest counter accepted so far on this session.
        floor: u32,
    },

    /// Received message counter was already accepted once.
    #[error("Duplicate message counter {0}")]
    DuplicateCounter(u32),

    /// Frame failed authentication or decryption.
    #[error("Frame authentication failed: {0}")]
    CryptoFailure(String),

    /// Manager is shutting down; no new state may be created.
    #[error("Shutting down")]
    ShuttingDown,

    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
}

/// Convenience result type for Weave operations.
pub type Result<T> = std::result::Result<T, WeaveError>;
