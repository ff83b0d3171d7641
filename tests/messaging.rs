//! Integration tests for the full messaging stack: fabric table,
//! secure sessions, exchanges, and replay protection wired over an
//! in-memory transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use weave::config::Config;
use weave::error::WeaveError;
use weave::exchange::{ExchangeDelegate, ExchangeHandle, ExchangeManager};
use weave::fabric::FabricTable;
use weave::message::defs::StatusResponse;
use weave::session::{
    AeadSessionCrypto, PairingState, PayloadHeader, PeerAddress, SecureSessionManager,
    SessionRole, Transport,
};

const NODE_A: u64 = 0xAAAA;
const NODE_B: u64 = 0xBBBB;
const FABRIC: u8 = 1;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Queue = Rc<RefCell<VecDeque<(PeerAddress, Vec<u8>)>>>;

struct QueueTransport(Queue);

impl Transport for QueueTransport {
    fn send_to(&mut self, dest: PeerAddress, frame: &[u8]) -> weave::Result<()> {
        self.0.borrow_mut().push_back((dest, frame.to_vec()));
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Event {
    Message(u16, u8, Vec<u8>),
    Timeout(u16),
    Closed(u16),
}

type Log = Rc<RefCell<Vec<Event>>>;

struct RecordingDelegate(Log);

impl ExchangeDelegate for RecordingDelegate {
    fn on_message_received(&mut self, h: ExchangeHandle, t: u8, p: &[u8]) {
        self.0.borrow_mut().push(Event::Message(h.id, t, p.to_vec()));
    }
    fn on_response_timeout(&mut self, h: ExchangeHandle) {
        self.0.borrow_mut().push(Event::Timeout(h.id));
    }
    fn on_exchange_closed(&mut self, h: ExchangeHandle) {
        self.0.borrow_mut().push(Event::Closed(h.id));
    }
}

/// One node's stack plus the queue its outbound frames land in.
struct Stack {
    exchanges: ExchangeManager,
    outbox: Queue,
    addr: PeerAddress,
}

fn addr_of(node: u64) -> PeerAddress {
    format!("127.0.0.1:{}", 5000 + (node & 0xFF))
        .parse()
        .unwrap()
}

fn stack(node: u64) -> Stack {
    let config = Config::default();
    let outbox = Queue::default();
    let mut fabrics = FabricTable::with_capacity(config.fabric.max_fabrics);
    fabrics.assign_fabric_index(FABRIC, node).unwrap();
    let sessions = SecureSessionManager::new(
        node,
        fabrics,
        Box::new(AeadSessionCrypto::new()),
        Box::new(QueueTransport(outbox.clone())),
        &config.session,
    );
    Stack {
        exchanges: ExchangeManager::new(sessions, config.exchange.max_exchanges),
        outbox,
        addr: addr_of(node),
    }
}

/// Pair two stacks with mirrored key ids, as a finished handshake would.
fn paired_stacks() -> (Stack, weave::session::SessionHandle, Stack, weave::session::SessionHandle) {
    init_logging();
    let mut a = stack(NODE_A);
    let mut b = stack(NODE_B);
    let secret = b"handshake output".to_vec();
    let ha = a
        .exchanges
        .sessions_mut()
        .new_pairing(
            addr_of(NODE_B),
            NODE_B,
            FABRIC,
            SessionRole::Initiator,
            &PairingState {
                local_key_id: 100,
                peer_key_id: 200,
                secret: secret.clone(),
            },
        )
        .unwrap();
    let hb = b
        .exchanges
        .sessions_mut()
        .new_pairing(
            addr_of(NODE_A),
            NODE_A,
            FABRIC,
            SessionRole::Responder,
            &PairingState {
                local_key_id: 200,
                peer_key_id: 100,
                secret,
            },
        )
        .unwrap();
    (a, ha, b, hb)
}

/// Pop the next frame a stack sent.
fn next_frame(stack: &Stack) -> (PeerAddress, Vec<u8>) {
    stack.outbox.borrow_mut().pop_front().expect("frame sent")
}

/// Reply from the responder on an initiator-opened exchange id.
fn respond(b: &mut Stack, hb: &weave::session::SessionHandle, exchange_id: u16, message_type: u8, payload: &[u8]) {
    let header = PayloadHeader::new(exchange_id, message_type, false);
    let mut plaintext = header.to_bytes().to_vec();
    plaintext.extend_from_slice(payload);
    b.exchanges
        .sessions_mut()
        .send_message(hb, &plaintext)
        .unwrap();
}

#[test]
fn test_request_response_conversation() {
    let (mut a, ha, mut b, hb) = paired_stacks();
    let log = Log::default();
    let exchange = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();

    // Request travels sealed to B. B has no matching exchange, so the
    // session layer accepts the frame but dispatch drops it.
    let request = StatusResponse { status: 0 }.encode().unwrap();
    a.exchanges.send_message(&exchange, 5, &request).unwrap();
    let (dest, frame) = next_frame(&a);
    assert_eq!(dest, addr_of(NODE_B));
    b.exchanges.on_message_received(a.addr, &frame).unwrap();

    // The responder application replies on the same exchange id.
    let reply = StatusResponse { status: 0x86 }.encode().unwrap();
    respond(&mut b, &hb, exchange.id, 9, &reply);
    let (_, frame) = next_frame(&b);
    a.exchanges.on_message_received(b.addr, &frame).unwrap();

    let events = log.borrow();
    assert_eq!(events.len(), 1);
    let Event::Message(id, message_type, payload) = &events[0] else {
        panic!("expected message event, got {events:?}");
    };
    assert_eq!(*id, exchange.id);
    assert_eq!(*message_type, 9);
    assert_eq!(StatusResponse::decode(payload).unwrap().status, 0x86);
}

#[test]
fn test_unknown_exchange_is_dropped_not_errored() {
    let (mut a, ha, mut b, _hb) = paired_stacks();
    let log = Log::default();
    let exchange = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();

    a.exchanges.send_message(&exchange, 1, b"hello").unwrap();
    let (_, frame) = next_frame(&a);
    // No exchange open on B: accepted by the session layer, dropped by
    // dispatch, and B's delegates see nothing.
    b.exchanges.on_message_received(a.addr, &frame).unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(b.exchanges.exchange_count(), 0);
}

#[test]
fn test_replayed_frame_rejected_before_dispatch() {
    let (mut a, ha, mut b, hb) = paired_stacks();
    let log = Log::default();
    let exchange = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();

    respond(&mut b, &hb, exchange.id, 2, b"once");
    let (_, frame) = next_frame(&b);
    a.exchanges.on_message_received(b.addr, &frame).unwrap();
    assert_eq!(
        a.exchanges.on_message_received(b.addr, &frame),
        Err(WeaveError::DuplicateCounter(1))
    );
    // Only the first delivery reached the delegate.
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_out_of_order_delivery_within_window() {
    let (mut a, ha, mut b, hb) = paired_stacks();
    let log = Log::default();
    let exchange = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();

    respond(&mut b, &hb, exchange.id, 1, b"first");
    respond(&mut b, &hb, exchange.id, 2, b"second");
    let (_, frame1) = next_frame(&b);
    let (_, frame2) = next_frame(&b);

    // Network reorders: counter 2 lands before counter 1.
    a.exchanges.on_message_received(b.addr, &frame2).unwrap();
    a.exchanges.on_message_received(b.addr, &frame1).unwrap();
    assert_eq!(log.borrow().len(), 2);

    // The late frame still counts as seen.
    assert_eq!(
        a.exchanges.on_message_received(b.addr, &frame1),
        Err(WeaveError::DuplicateCounter(1))
    );
}

#[test]
fn test_response_timeout_lifecycle() {
    let (mut a, ha, _b, _hb) = paired_stacks();
    let log = Log::default();
    let exchange = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();

    let config = Config::default();
    let deadline = Instant::now() + Duration::from_millis(config.exchange.response_timeout_ms);
    a.exchanges.send_message(&exchange, 1, b"ping").unwrap();
    a.exchanges.expect_response(&exchange, deadline).unwrap();

    // Not yet due.
    a.exchanges.poll_timeouts(deadline - Duration::from_millis(1));
    assert!(log.borrow().is_empty());

    a.exchanges.poll_timeouts(deadline);
    assert_eq!(
        *log.borrow(),
        vec![Event::Timeout(exchange.id), Event::Closed(exchange.id)]
    );
    assert_eq!(
        a.exchanges.send_message(&exchange, 1, b"late"),
        Err(WeaveError::ExchangeNotFound)
    );
}

#[test]
fn test_arrived_response_disarms_timeout() {
    let (mut a, ha, mut b, hb) = paired_stacks();
    let log = Log::default();
    let exchange = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();
    let deadline = Instant::now() + Duration::from_millis(50);
    a.exchanges.expect_response(&exchange, deadline).unwrap();

    respond(&mut b, &hb, exchange.id, 3, b"pong");
    let (_, frame) = next_frame(&b);
    a.exchanges.on_message_received(b.addr, &frame).unwrap();

    // Deadline long past, but the response already disarmed it.
    a.exchanges.poll_timeouts(deadline + Duration::from_secs(10));
    assert_eq!(*log.borrow(), vec![Event::Message(exchange.id, 3, b"pong".to_vec())]);
}

#[test]
fn test_session_eviction_stops_traffic() {
    let (mut a, ha, _b, _hb) = paired_stacks();
    let log = Log::default();
    let exchange = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log)))
        .unwrap();

    a.exchanges.sessions_mut().remove_session(&ha);
    assert_eq!(
        a.exchanges.send_message(&exchange, 1, b"x"),
        Err(WeaveError::SessionNotFound)
    );
    assert_eq!(
        a.exchanges.new_context(ha, Box::new(RecordingDelegate(Log::default()))),
        Err(WeaveError::SessionNotFound)
    );
}

#[test]
fn test_shutdown_closes_everything_once() {
    let (mut a, ha, _b, _hb) = paired_stacks();
    let log = Log::default();
    let e1 = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();
    let e2 = a
        .exchanges
        .new_context(ha, Box::new(RecordingDelegate(log.clone())))
        .unwrap();

    a.exchanges.shutdown();

    let events = log.borrow();
    assert_eq!(events.len(), 2);
    assert!(events.contains(&Event::Closed(e1.id)));
    assert!(events.contains(&Event::Closed(e2.id)));
    drop(events);

    assert!(matches!(
        a.exchanges
            .new_context(ha, Box::new(RecordingDelegate(log))),
        Err(WeaveError::ShuttingDown)
    ));
    // Shutting down again fires nothing new.
    a.exchanges.shutdown();
}

#[test]
fn test_cross_fabric_sessions_are_distinct() {
    init_logging();
    let mut a = stack(NODE_A);
    a.exchanges
        .sessions_mut()
        .fabrics_mut()
        .assign_fabric_index(2, NODE_A)
        .unwrap();

    let pairing = |local, peer| PairingState {
        local_key_id: local,
        peer_key_id: peer,
        secret: b"s".to_vec(),
    };
    let h1 = a
        .exchanges
        .sessions_mut()
        .new_pairing(addr_of(NODE_B), NODE_B, FABRIC, SessionRole::Initiator, &pairing(1, 2))
        .unwrap();
    let h2 = a
        .exchanges
        .sessions_mut()
        .new_pairing(addr_of(NODE_B), NODE_B, 2, SessionRole::Initiator, &pairing(3, 4))
        .unwrap();
    assert_ne!(h1, h2);
    assert_eq!(a.exchanges.sessions().session_count(), 2);

    a.exchanges.sessions_mut().remove_session(&h1);
    assert_eq!(a.exchanges.sessions().session_count(), 1);
    assert_eq!(
        a.exchanges.sessions().get_session_handle(NODE_B, 2),
        Some(h2)
    );
    assert!(a.exchanges.sessions().peer_address(&h2).is_some());
}
