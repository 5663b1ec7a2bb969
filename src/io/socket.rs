//! In-process simulated transport.
//!
//! One `SimulatedBus` is shared by every party-shard and the client in a
//! single process; `connect` hands each endpoint its own inbox and a handle
//! it can use to reach any other registered endpoint by `(party_id,
//! machine_id)`. A real deployment would swap this module for a TCP/QUIC
//! transport driven by `Configuration::network`, behind the same `Socket`
//! trait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::wire::BatchAnnounce;

/// What can cross the wire between two endpoints.
#[derive(Debug, Clone)]
pub enum Payload {
    Announce(BatchAnnounce),
    Query(Vec<u8>),
    Response(Vec<u8>),
}

/// A received message, tagged with the sender's identity so the receiving
/// party-shard can route it (e.g. match a sibling's `ForwardQuery` against
/// the right `query_indices` bucket).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from_party: u32,
    pub from_machine: u32,
    pub payload: Payload,
}

/// Capability to reach any other registered endpoint. Implementations never
/// block on `send`: a closed or nonexistent peer is a `TransportFailure`,
/// not a retry.
pub trait Socket: Send + Sync {
    fn send(&self, to_party: u32, to_machine: u32, payload: Payload) -> Result<(), ProtocolError>;
}

/// The shared registry backing a `SimulatedBus`. Kept behind an `Arc<Mutex<_>>`
/// rather than a process-global `static` so a test can spin up several
/// independent buses without cross-contamination.
#[derive(Clone, Default)]
pub struct SimulatedBus {
    registry: Arc<Mutex<HashMap<(u32, u32), mpsc::UnboundedSender<Envelope>>>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `(party_id, machine_id)` on this bus, returning its socket
    /// handle and the receiving half of its inbox.
    pub fn connect(&self, party_id: u32, machine_id: u32) -> (SimulatedSocket, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.lock().unwrap().insert((party_id, machine_id), tx);
        (SimulatedSocket { bus: self.clone(), from_party: party_id, from_machine: machine_id }, rx)
    }
}

/// One endpoint's handle onto a `SimulatedBus`.
pub struct SimulatedSocket {
    bus: SimulatedBus,
    from_party: u32,
    from_machine: u32,
}

impl Socket for SimulatedSocket {
    fn send(&self, to_party: u32, to_machine: u32, payload: Payload) -> Result<(), ProtocolError> {
        let registry = self.bus.registry.lock().unwrap();
        let tx = registry.get(&(to_party, to_machine)).ok_or_else(|| {
            ProtocolError::TransportFailure(format!("no route to party {to_party} machine {to_machine}"))
        })?;
        tx.send(Envelope { from_party: self.from_party, from_machine: self.from_machine, payload })
            .map_err(|_| ProtocolError::TransportFailure(format!("party {to_party} machine {to_machine} closed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_the_registered_endpoint() {
        let bus = SimulatedBus::new();
        let (from, _from_rx) = bus.connect(1, 1);
        let (_to, mut to_rx) = bus.connect(2, 1);

        from.send(2, 1, Payload::Query(vec![1, 2, 3])).unwrap();

        let envelope = to_rx.try_recv().unwrap();
        assert_eq!(envelope.from_party, 1);
        assert_eq!(envelope.from_machine, 1);
        assert!(matches!(envelope.payload, Payload::Query(bytes) if bytes == vec![1, 2, 3]));
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_failure() {
        let bus = SimulatedBus::new();
        let (from, _rx) = bus.connect(1, 1);
        let err = from.send(9, 9, Payload::Response(vec![])).unwrap_err();
        assert!(matches!(err, ProtocolError::TransportFailure(_)));
    }

    #[test]
    fn closed_receiver_is_a_transport_failure() {
        let bus = SimulatedBus::new();
        let (from, _from_rx) = bus.connect(1, 1);
        let (_to, to_rx) = bus.connect(2, 1);
        drop(to_rx);
        let err = from.send(2, 1, Payload::Response(vec![])).unwrap_err();
        assert!(matches!(err, ProtocolError::TransportFailure(_)));
    }
}
