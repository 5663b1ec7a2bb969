//! Client-side query construction and response reconstruction.
//!
//! Grounded on `drivacy/parties/client.cc`'s `MakeQuery`/`OnReceiveResponse`
//! pair, realized here as pure functions the client engine (`crate::client`)
//! calls and threads FIFO state around.

use crate::config::Configuration;
use crate::field::FieldElement;
use crate::prg::ClientRng;
use crate::wire::WireQuery;

/// The client's secret for one outstanding query: the sum of the masks it
/// drew, subtracted back out of the final response to recover the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preshare(pub FieldElement);

/// Builds the hop-1 query for `value` and the client-side secret needed to
/// reconstruct the eventual response.
///
/// Draws `parties - 1` uniform masks `r_1..r_{N-1}` from `rng`, sets the
/// running accumulator to `value + sum(r_i)`, and carries the masks
/// themselves alongside it so each party `p` can read off and strip its own
/// `r_p`. Deterministic given `rng`'s state: two calls against RNGs primed
/// with the same seed produce identical output.
pub fn create_query(value: u64, config: &Configuration, rng: &mut ClientRng) -> (WireQuery, Preshare) {
    let modulus = config.modulus;
    let mask_count = (config.parties - 1) as usize;
    let shares: Vec<FieldElement> = (0..mask_count).map(|_| rng.field_element(modulus)).collect();

    let mut preshare = FieldElement::zero(modulus);
    let mut accumulator = FieldElement::new(value, modulus);
    for share in &shares {
        preshare = preshare.add(share).expect("shares share a modulus by construction");
        accumulator = accumulator.add(share).expect("shares share a modulus by construction");
    }

    (WireQuery { accumulator, shares }, Preshare(preshare))
}

/// Inverts the client's own masking contribution to recover `table[value]`
/// from the final response and the matching `Preshare`.
pub fn reconstruct_response(response: FieldElement, preshare: Preshare) -> u64 {
    response.sub(&preshare.0).expect("response and preshare share a modulus by construction").value()
}
