//! Party-side response processing: re-adding the share this party stripped
//! at query time, inverting `query::process_query`'s subtraction.

use crate::field::FieldElement;
use crate::protocol::QueryState;

/// At party `p < N`: adds back `r_p` (the share retained in `state` since
/// this query was processed) to the running response. By the time the
/// response reaches the client, it carries `value + sum(r_1..r_{N-1})`,
/// which `client::reconstruct_response` undoes with the matching preshare.
pub fn process_response(incoming: FieldElement, state: &QueryState) -> FieldElement {
    incoming.add(&state.0).expect("response and retained share share a modulus by construction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_response_inverts_process_query() {
        let modulus = 1_000_003u64;
        let share = FieldElement::new(917, modulus);
        let accumulator = FieldElement::new(123, modulus);

        // query phase: strip the share.
        let stripped = accumulator.sub(&share).unwrap();
        // response phase: add it back.
        let restored = process_response(stripped, &QueryState(share));

        assert_eq!(restored, accumulator);
    }
}
