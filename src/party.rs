//! The party-shard engine: the per-batch state machine every `(party_id,
//! machine_id)` pair runs, tying together [`crate::protocol`]'s pure
//! transforms, [`crate::shuffle::Shuffler`]'s cross-shard mixing, and a
//! [`crate::io::Socket`] for transport.
//!
//! Grounded on `drivacy/parties/party.cc`'s batch pipeline (collect, shuffle,
//! forward, await, deshuffle, reply), adapted to `async`/`tokio` in place of
//! the original's callback-registration style.

use log::{debug, error, info};

use crate::config::{Configuration, Table};
use crate::error::ProtocolError;
use crate::field::FieldElement;
use crate::io::socket::{Envelope, Payload};
use crate::io::Socket;
use crate::protocol::query::{process_query, QueryOutcome};
use crate::protocol::QueryState;
use crate::shuffle::Shuffler;
use crate::wire::{self, BatchAnnounce, WireQuery, WireResponse};

/// Party identity used for the client's slot in the transport's address
/// space: the client is not a party, but it originates batch 1's traffic and
/// receives the final replies, so it needs an address on the same bus.
pub const CLIENT_PARTY_ID: u32 = 0;

/// Where this shard's batch pipeline currently is. Exposed for logging and
/// tests; the engine never exposes a way to jump phases out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyState {
    Idle,
    Collecting,
    Shuffling,
    Forwarding,
    AwaitingResponses,
    Deshuffling,
    Replying,
}

/// One party-shard's running engine. Owns its transport handle, its inbox,
/// and the `Shuffler` instance it re-initializes every batch.
pub struct Party<S: Socket> {
    party_id: u32,
    machine_id: u32,
    config: Configuration,
    table: Table,
    socket: S,
    inbox: tokio::sync::mpsc::UnboundedReceiver<Envelope>,
    /// Envelopes read out of turn (a sibling or downstream peer running
    /// ahead of this shard) and set aside until the phase that wants them.
    stash: Vec<Envelope>,
    shuffler: Shuffler,
    state: PartyState,
}

impl<S: Socket> Party<S> {
    pub fn new(
        party_id: u32,
        machine_id: u32,
        config: Configuration,
        table: Table,
        socket: S,
        inbox: tokio::sync::mpsc::UnboundedReceiver<Envelope>,
    ) -> Self {
        let parallelism = config.parallelism;
        Self {
            party_id,
            machine_id,
            config,
            table,
            socket,
            inbox,
            stash: Vec::new(),
            shuffler: Shuffler::new(party_id, machine_id, parallelism),
            state: PartyState::Idle,
        }
    }

    pub fn state(&self) -> PartyState {
        self.state
    }

    fn set_state(&mut self, state: PartyState) {
        debug!("party {} machine {}: {:?} -> {:?}", self.party_id, self.machine_id, self.state, state);
        self.state = state;
    }

    fn upstream_party(&self) -> u32 {
        if self.party_id == 1 {
            CLIENT_PARTY_ID
        } else {
            self.party_id - 1
        }
    }

    fn is_last_party(&self) -> bool {
        self.party_id == self.config.parties
    }

    /// Runs one full batch to completion: Idle through Replying and back to
    /// Idle. Blocks until every phase's expected traffic has arrived.
    pub async fn run_batch(&mut self) -> Result<(), ProtocolError> {
        match self.run_batch_phases().await {
            Ok(batch_size) => {
                info!(
                    "party {} machine {}: batch complete, {} quer{}",
                    self.party_id,
                    self.machine_id,
                    batch_size,
                    if batch_size == 1 { "y" } else { "ies" }
                );
                Ok(())
            }
            Err(err) => {
                error!("party {} machine {}: batch aborted: {err}", self.party_id, self.machine_id);
                Err(err)
            }
        }
    }

    async fn run_batch_phases(&mut self) -> Result<u32, ProtocolError> {
        let (batch_size, nonce) = self.await_batch_announce().await?;
        self.shuffler.initialize(batch_size, nonce);

        self.collect(batch_size).await?;
        self.shuffle(batch_size).await?;

        if self.is_last_party() {
            self.relay_own_bucket_as_responses(batch_size).await?;
        } else {
            self.forward(batch_size).await?;
            self.await_and_relay_downstream_responses(batch_size).await?;
        }

        self.gather_own_responses(batch_size).await?;
        self.reply(batch_size).await?;

        self.set_state(PartyState::Idle);
        Ok(batch_size)
    }

    async fn recv_matching(&mut self, pred: impl Fn(&Envelope) -> bool) -> Result<Envelope, ProtocolError> {
        if let Some(pos) = self.stash.iter().position(&pred) {
            return Ok(self.stash.remove(pos));
        }
        loop {
            let envelope =
                self.inbox.recv().await.ok_or_else(|| ProtocolError::TransportFailure("inbox closed".into()))?;
            if pred(&envelope) {
                return Ok(envelope);
            }
            self.stash.push(envelope);
        }
    }

    async fn await_batch_announce(&mut self) -> Result<(u32, u64), ProtocolError> {
        self.set_state(PartyState::Collecting);
        let upstream = self.upstream_party();
        let envelope =
            self.recv_matching(|e| e.from_party == upstream && matches!(e.payload, Payload::Announce(_))).await?;
        match envelope.payload {
            Payload::Announce(BatchAnnounce { size, nonce }) => Ok((size, nonce)),
            _ => unreachable!("recv_matching filtered to Announce"),
        }
    }

    async fn collect(&mut self, batch_size: u32) -> Result<(), ProtocolError> {
        let upstream = self.upstream_party();
        let query_len = wire::query_size(self.party_id, self.config.parties);
        let modulus = self.config.modulus;

        for i in 0..batch_size as usize {
            let envelope =
                self.recv_matching(|e| e.from_party == upstream && matches!(e.payload, Payload::Query(_))).await?;
            let bytes = match envelope.payload {
                Payload::Query(bytes) => bytes,
                _ => unreachable!(),
            };
            let wire_query = WireQuery::decode(&bytes, modulus, query_len)?;
            let (outcome, state) = process_query(wire_query, self.party_id, &self.config, &self.table);

            let (scattered, state) = match outcome {
                QueryOutcome::Forward(forward) => {
                    (forward.encode(), state.expect("intermediate party retains a state"))
                }
                QueryOutcome::Resolved(value) => {
                    (value.to_be_bytes().to_vec(), QueryState(FieldElement::zero(modulus)))
                }
            };
            self.shuffler.machine_of_next_query(i, scattered, state);
        }
        Ok(())
    }

    async fn shuffle(&mut self, batch_size: u32) -> Result<(), ProtocolError> {
        self.set_state(PartyState::Shuffling);
        while let Some((dest, bytes)) = self.shuffler.next_query() {
            self.socket.send(self.party_id, dest, Payload::Query(bytes))?;
        }

        let my_party = self.party_id;
        loop {
            let envelope = self
                .recv_matching(|e| e.from_party == my_party && matches!(e.payload, Payload::Query(_)))
                .await?;
            let bytes = match envelope.payload {
                Payload::Query(bytes) => bytes,
                _ => unreachable!(),
            };
            let full = self.shuffler.shuffle_query(envelope.from_machine, bytes)?;
            if full {
                break;
            }
        }
        let _ = batch_size;
        Ok(())
    }

    async fn forward(&mut self, batch_size: u32) -> Result<(), ProtocolError> {
        self.set_state(PartyState::Forwarding);
        let downstream = self.party_id + 1;
        for _ in 0..batch_size {
            let (_slot, bytes) =
                self.shuffler.next_received_query().expect("shuffling phase filled the full bucket");
            self.socket.send(downstream, self.machine_id, Payload::Query(bytes))?;
        }
        Ok(())
    }

    async fn await_and_relay_downstream_responses(&mut self, batch_size: u32) -> Result<(), ProtocolError> {
        self.set_state(PartyState::AwaitingResponses);
        let downstream = self.party_id + 1;
        let modulus = self.config.modulus;
        for _ in 0..batch_size {
            let envelope = self
                .recv_matching(|e| e.from_party == downstream && matches!(e.payload, Payload::Response(_)))
                .await?;
            let bytes = match envelope.payload {
                Payload::Response(bytes) => bytes,
                _ => unreachable!(),
            };
            let response = WireResponse::decode(&bytes, modulus)?;
            let relay_to = self.shuffler.machine_of_next_response();
            self.socket.send(self.party_id, relay_to, Payload::Response(response.encode()))?;
        }
        Ok(())
    }

    /// Last-party shortcut: there is no downstream to forward to or await —
    /// the received bucket already holds the resolved table values, so they
    /// relay straight back to their originating siblings.
    async fn relay_own_bucket_as_responses(&mut self, batch_size: u32) -> Result<(), ProtocolError> {
        self.set_state(PartyState::Deshuffling);
        for _ in 0..batch_size {
            let (_slot, bytes) =
                self.shuffler.next_received_query().expect("shuffling phase filled the full bucket");
            let relay_to = self.shuffler.machine_of_next_response();
            self.socket.send(self.party_id, relay_to, Payload::Response(bytes))?;
        }
        Ok(())
    }

    async fn gather_own_responses(&mut self, batch_size: u32) -> Result<(), ProtocolError> {
        self.set_state(PartyState::Deshuffling);
        let my_party = self.party_id;
        let modulus = self.config.modulus;
        for _ in 0..batch_size {
            let envelope = self
                .recv_matching(|e| e.from_party == my_party && matches!(e.payload, Payload::Response(_)))
                .await?;
            let bytes = match envelope.payload {
                Payload::Response(bytes) => bytes,
                _ => unreachable!(),
            };
            let response = WireResponse::decode(&bytes, modulus)?;
            self.shuffler.deshuffle_response(envelope.from_machine, response.0)?;
        }
        Ok(())
    }

    async fn reply(&mut self, batch_size: u32) -> Result<(), ProtocolError> {
        self.set_state(PartyState::Replying);
        let upstream = self.upstream_party();
        for _ in 0..batch_size {
            let value = self.shuffler.next_response().expect("deshuffling phase filled every local index");
            let bytes = WireResponse(value).encode();
            self.socket.send(upstream, self.machine_id, Payload::Response(bytes))?;
        }
        Ok(())
    }
}
