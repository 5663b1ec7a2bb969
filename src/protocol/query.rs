//! Party-side query processing: stripping one party's additive share off the
//! running accumulator, or — at the last party — resolving the table lookup.

use crate::config::{Configuration, Table};
use crate::field::FieldElement;
use crate::protocol::QueryState;
use crate::wire::WireQuery;

/// What `process_query` produces: either a `ForwardQuery` to hand to the
/// next party, or — only at party N — the seed `Response` to start sending
/// back up the chain.
pub enum QueryOutcome {
    Forward(WireQuery),
    Resolved(FieldElement),
}

/// At party `p` (1-indexed) out of `n`: strips this party's share `r_p` off
/// the incoming accumulator, retaining `r_p` as the `QueryState` needed to
/// invert this step on the response path, and forwards what remains.
///
/// At party `n` the incoming query carries no more shares: the accumulator
/// *is* the plaintext key (every prior party's mask has been stripped), so
/// this resolves the table lookup directly instead of forwarding.
pub fn process_query(
    incoming: WireQuery,
    party_id: u32,
    config: &Configuration,
    table: &Table,
) -> (QueryOutcome, Option<QueryState>) {
    if party_id == config.parties {
        debug_assert!(incoming.shares.is_empty());
        let key = incoming.accumulator.value();
        let value = table.get(&key).copied().unwrap_or(0);
        let seed = FieldElement::new(value, config.modulus);
        return (QueryOutcome::Resolved(seed), None);
    }

    let mut shares = incoming.shares;
    let my_share = shares.remove(0);
    let accumulator = incoming
        .accumulator
        .sub(&my_share)
        .expect("wire shares are constructed against the configured modulus");

    (QueryOutcome::Forward(WireQuery { accumulator, shares }), Some(QueryState(my_share)))
}
