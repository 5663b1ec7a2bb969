//! Incremental, cross-shard Knuth shuffle.
//!
//! Mixes the `T = B * parallelism` queries a party's shards collectively
//! produce in one batch across those same shards, before any of them
//! forwards on to the next party — and inverts the routing on the response
//! path. Every shard of one party computes the *identical* global
//! permutation (seeded from `(party_id, batch_nonce)`, never `machine_id`),
//! which is what lets shards agree on routing without exchanging the
//! permutation itself.
//!
//! Grounded on `drivacy/protocol/shuffle.cc`'s `Initialize`/`ShuffleQuery`/
//! `DeshuffleResponse` family.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::field::FieldElement;
use crate::prg::Prg;
use crate::protocol::response::process_response;
use crate::protocol::QueryState;

/// Errors the Shuffler raises on malformed cross-shard traffic. Both are
/// fatal to the batch: there is no partial-batch recovery.
#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("received a message from machine {from}, which has no route into this shard's batch")]
    UnexpectedSender { from: u32 },
    #[error("machine {from} sent more than its expected {expected} entries for this batch")]
    BucketOverflow { from: u32, expected: usize },
}

/// One shard's view of a party's per-batch shuffle.
///
/// Constructed once per `(party_id, machine_id)` and re-initialized at the
/// start of every batch; `initialize` fully resets all state (idempotence
/// across batches).
pub struct Shuffler {
    party_id: u32,
    machine_id: u32,
    parallelism: u32,
    batch_size: usize,

    /// Set A: queries this shard itself produced. `query_machine_ids[i]` is
    /// the sibling shard query `i` (in this shard's own input order) is
    /// routed to.
    query_machine_ids: Vec<u32>,
    /// Per destination sibling, the FIFO of (original local index, retained
    /// `QueryState`) for queries sent there, consumed as responses return.
    pending: HashMap<u32, VecDeque<(usize, QueryState)>>,
    /// Per destination sibling, the FIFO of already-processed outgoing
    /// `ForwardQuery` bytes awaiting `next_query`.
    outgoing: HashMap<u32, VecDeque<Vec<u8>>>,
    /// Set-A responses, indexed by original local index; filled in as
    /// `deshuffle_response` resolves each.
    completed: Vec<Option<FieldElement>>,
    completed_count: usize,
    drain_cursor: usize,

    /// Set B: queries received from siblings, landing in this shard's own
    /// shuffled bucket. `query_indices[source]` is the ascending list of
    /// local slots this shard will place `source`'s successive sends into.
    query_indices: HashMap<u32, Vec<usize>>,
    recv_cursor: HashMap<u32, usize>,
    received: Vec<Option<Vec<u8>>>,
    received_count: usize,
    /// For local slot `j` in the received bucket, which sibling originally
    /// sent it — used to relay its eventual response back.
    response_machine_ids: Vec<u32>,
    relay_cursor: usize,
}

impl Shuffler {
    pub fn new(party_id: u32, machine_id: u32, parallelism: u32) -> Self {
        Self {
            party_id,
            machine_id,
            parallelism,
            batch_size: 0,
            query_machine_ids: Vec::new(),
            pending: HashMap::new(),
            outgoing: HashMap::new(),
            completed: Vec::new(),
            completed_count: 0,
            drain_cursor: 0,
            query_indices: HashMap::new(),
            recv_cursor: HashMap::new(),
            received: Vec::new(),
            received_count: 0,
            response_machine_ids: Vec::new(),
            relay_cursor: 0,
        }
    }

    /// Precomputes all routing tables for a batch of `batch_size` queries
    /// per shard, under the permutation seeded from `(party_id, nonce)`.
    pub fn initialize(&mut self, batch_size: usize, nonce: u64) {
        let m = self.parallelism as usize;
        let t = batch_size * m;

        let mut positions: Vec<usize> = (0..t).collect();
        if t > 1 {
            let mut prg = Prg::for_batch(self.party_id, nonce);
            for i in 0..t - 1 {
                let j = prg.uniform_range(i as u64, t as u64) as usize;
                positions.swap(i, j);
            }
        }
        let mut slot_of = vec![0usize; t];
        for (slot, &original) in positions.iter().enumerate() {
            slot_of[original] = slot;
        }

        let my_base = (self.machine_id as usize - 1) * batch_size;

        let mut query_machine_ids = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let global_index = my_base + i;
            let final_slot = slot_of[global_index];
            let dest = (final_slot / batch_size) as u32 + 1;
            query_machine_ids.push(dest);
        }

        let mut query_indices: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut response_machine_ids = Vec::with_capacity(batch_size);
        for j in 0..batch_size {
            let global_slot = my_base + j;
            let original_global_index = positions[global_slot];
            let source = (original_global_index / batch_size) as u32 + 1;
            response_machine_ids.push(source);
            query_indices.entry(source).or_default().push(j);
        }

        self.batch_size = batch_size;
        self.query_machine_ids = query_machine_ids;
        self.pending = HashMap::new();
        self.outgoing = HashMap::new();
        self.completed = vec![None; batch_size];
        self.completed_count = 0;
        self.drain_cursor = 0;
        self.query_indices = query_indices;
        self.recv_cursor = HashMap::new();
        self.received = vec![None; batch_size];
        self.received_count = 0;
        self.response_machine_ids = response_machine_ids;
        self.relay_cursor = 0;
    }

    /// How many Set-A queries this shard should expect from each sibling
    /// (1-indexed, length `parallelism`). A zero entry means this shard must
    /// not block waiting on that sibling.
    pub fn incoming_queries_count(&self) -> Vec<usize> {
        (1..=self.parallelism).map(|m| self.query_indices.get(&m).map(Vec::len).unwrap_or(0)).collect()
    }

    /// Records where the `local_index`-th locally-processed query routes to
    /// and retains its `QueryState` for the eventual response. Must be
    /// called once per local index, in ascending order.
    pub fn machine_of_next_query(&mut self, local_index: usize, forward_query: Vec<u8>, state: QueryState) -> u32 {
        let dest = self.query_machine_ids[local_index];
        self.pending.entry(dest).or_default().push_back((local_index, state));
        self.outgoing.entry(dest).or_default().push_back(forward_query);
        dest
    }

    /// Drains this shard's outgoing, already-routed `ForwardQuery`s.
    pub fn next_query(&mut self) -> Option<(u32, Vec<u8>)> {
        let mut dests: Vec<u32> = self.outgoing.keys().copied().collect();
        dests.sort_unstable();
        for dest in dests {
            if let Some(bytes) = self.outgoing.get_mut(&dest).unwrap().pop_front() {
                return Some((dest, bytes));
            }
        }
        None
    }

    /// Accepts an inbound `ForwardQuery` from sibling `from_machine`.
    /// Returns `true` once this completes the full `batch_size`-sized
    /// shuffled bucket for this shard.
    pub fn shuffle_query(&mut self, from_machine: u32, forward_query: Vec<u8>) -> Result<bool, ShuffleError> {
        let slots = self
            .query_indices
            .get(&from_machine)
            .ok_or(ShuffleError::UnexpectedSender { from: from_machine })?;
        let cursor = self.recv_cursor.entry(from_machine).or_insert(0);
        let slot = *slots
            .get(*cursor)
            .ok_or(ShuffleError::BucketOverflow { from: from_machine, expected: slots.len() })?;
        self.received[slot] = Some(forward_query);
        *cursor += 1;
        self.received_count += 1;
        Ok(self.received_count == self.batch_size)
    }

    /// Drains this shard's received bucket, in post-shuffle slot order
    /// (0..batch_size) — the order in which it forwards onward to the next
    /// party, and in which it must later relay back responses.
    pub fn next_received_query(&mut self) -> Option<(usize, Vec<u8>)> {
        for j in 0..self.batch_size {
            if self.received[j].is_some() {
                return self.received[j].take().map(|bytes| (j, bytes));
            }
        }
        None
    }

    /// The sibling to relay the `j`-th (in received-slot order) response
    /// back to. Must be called once per slot, in ascending order, in step
    /// with sending that slot's processed response.
    pub fn machine_of_next_response(&mut self) -> u32 {
        let m = self.response_machine_ids[self.relay_cursor];
        self.relay_cursor += 1;
        m
    }

    /// Accepts an inbound response from sibling `from_machine` for one of
    /// this shard's own Set-A queries, applies this party's inverse
    /// transform using the retained `QueryState`, and files the result by
    /// original local index. Returns `true` once the full bucket of Set-A
    /// responses has arrived.
    pub fn deshuffle_response(&mut self, from_machine: u32, response: FieldElement) -> Result<bool, ShuffleError> {
        let queue =
            self.pending.get_mut(&from_machine).ok_or(ShuffleError::UnexpectedSender { from: from_machine })?;
        let (local_index, state) =
            queue.pop_front().ok_or(ShuffleError::BucketOverflow { from: from_machine, expected: 0 })?;
        self.completed[local_index] = Some(process_response(response, &state));
        self.completed_count += 1;
        Ok(self.completed_count == self.batch_size)
    }

    /// Drains the deshuffled Set-A responses in original local-index order —
    /// the order this shard must reply upstream in.
    pub fn next_response(&mut self) -> Option<FieldElement> {
        while self.drain_cursor < self.batch_size {
            let i = self.drain_cursor;
            self.drain_cursor += 1;
            if let Some(value) = self.completed[i].take() {
                return Some(value);
            }
        }
        None
    }
}
