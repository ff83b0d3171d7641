//! # Weave Core
//!
//! Session and structured-message core for a secure device-control
//! protocol: a schema-validated tagged binary codec underneath a secure
//! session, exchange, and replay-protection stack.
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                       application                             |
//! +---------------------------------------------------------------+
//! | message   schema-validated structured messages  (tlv below)   |
//! +---------------------------------------------------------------+
//! | exchange  request/response multiplexing, timeouts             |
//! +---------------------------------------------------------------+
//! | session   frame sealing, counters, fabric scoping             |
//! +---------------------------------------------------------------+
//! | transport (external; `session::Transport` + `io` readiness)   |
//! +---------------------------------------------------------------+
//! ```
//!
//! | Module      | Responsibility                                      |
//! |-------------|-----------------------------------------------------|
//! | [`tlv`]     | Tag-length-value read/write cursors                 |
//! | [`message`] | Schema tables, validating parsers, safe builders    |
//! | [`fabric`]  | Fabric membership table                             |
//! | [`session`] | Secure sessions, frame protection, transport seam   |
//! | [`counter`] | Send counters and replay windows                    |
//! | [`exchange`]| Exchange multiplexing and delegate dispatch         |
//! | [`io`]      | Socket readiness capability for transports          |
//! | [`config`]  | Limits and timeouts (TOML file + `WEAVE_*` env)     |
//!
//! The crate is single-threaded by design: managers are owned values,
//! timeouts are polled cooperatively, and transports integrate with an
//! external event loop through [`io::SocketWatcher`].
//!
//! Enable the `crypto` feature for real frame protection
//! (ChaCha20-Poly1305 + HKDF-SHA256); the default build substitutes a
//! masking scheme that is NOT secure and exists only for tests.
//!
//! ## Encoding and decoding a message
//!
//! ```
//! use weave::message::defs::{
//!     AttributePath, AttributeStatus, Status, WriteResponse,
//! };
//!
//! let response = WriteResponse {
//!     write_responses: vec![AttributeStatus {
//!         path: AttributePath {
//!             endpoint: Some(1),
//!             cluster: Some(6),
//!             attribute: Some(0),
//!         },
//!         status: Status { status: 0, cluster_status: None },
//!     }],
//! };
//!
//! let wire = response.encode().unwrap();
//! // decode() validates against the schema before reading any field.
//! assert_eq!(WriteResponse::decode(&wire).unwrap(), response);
//! ```
//!
//! ## Standing up the messaging stack
//!
//! ```
//! use weave::config::Config;
//! use weave::exchange::ExchangeManager;
//! use weave::fabric::FabricTable;
//! use weave::session::{
//!     AeadSessionCrypto, PairingState, PeerAddress, SecureSessionManager,
//!     SessionRole, Transport,
//! };
//!
//! struct NullTransport;
//! impl Transport for NullTransport {
//!     fn send_to(&mut self, _dest: PeerAddress, _frame: &[u8]) -> weave::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let config = Config::default();
//! let mut fabrics = FabricTable::with_capacity(config.fabric.max_fabrics);
//! fabrics.assign_fabric_index(1, 0x1122).unwrap();
//!
//! let mut sessions = SecureSessionManager::new(
//!     0x1122,
//!     fabrics,
//!     Box::new(AeadSessionCrypto::new()),
//!     Box::new(NullTransport),
//!     &config.session,
//! );
//! let session = sessions
//!     .new_pairing(
//!         "192.0.2.1:5540".parse().unwrap(),
//!         0x3344,
//!         1,
//!         SessionRole::Initiator,
//!         &PairingState {
//!             local_key_id: 1,
//!             peer_key_id: 2,
//!             secret: b"negotiated elsewhere".to_vec(),
//!         },
//!     )
//!     .unwrap();
//!
//! let exchanges = ExchangeManager::new(sessions, config.exchange.max_exchanges);
//! assert_eq!(exchanges.exchange_count(), 0);
//! let _ = session;
//! ```

pub mod config;
pub mod counter;
pub mod error;
pub mod exchange;
pub mod fabric;
pub mod io;
pub mod message;
pub mod session;
pub mod tlv;

pub use error::{Result, WeaveError};
pub use message::{PROTOCOL_REVISION, REVISION_TAG};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
