//! The pure protocol-phase transformations: client-side query construction
//! and response reconstruction, and party-side query/response processing.
//!
//! None of these functions perform I/O; the party engine (`crate::party`)
//! and client engine (`crate::client`) are the only callers, and they own
//! all the mutable batch/FIFO state these functions are handed explicitly.

pub mod client;
pub mod query;
pub mod response;

use crate::field::FieldElement;

/// The per-query secret a party retains between processing a query and
/// processing its matching response within one batch: the additive share
/// `r_p` this party stripped from the running accumulator at query time,
/// re-added to the response on the way back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryState(pub FieldElement);
