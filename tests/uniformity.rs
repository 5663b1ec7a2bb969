//! Testable Property 6 (statistical uniformity): over >= 10^4 batches at
//! `(M=3, B=4)`, the destination each local index routes to must fall within
//! a chi-square acceptance region of the uniform distribution over the 3
//! sibling machines.

use drivacy::field::FieldElement;
use drivacy::protocol::QueryState;
use drivacy::shuffle::Shuffler;
use proptest::prelude::*;

const PARALLELISM: u32 = 3;
const BATCH_SIZE: usize = 4;
const BATCHES: u64 = 10_000;
/// Chi-square critical value for 2 degrees of freedom (3 categories) at
/// significance level p=0.01.
const CHI_SQUARE_CRITICAL_P01_DF2: f64 = 9.210;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1))]

    #[test]
    fn destination_distribution_is_uniform_within_chi_square_bound(seed in any::<u64>()) {
        let mut counts = vec![[0u64; PARALLELISM as usize]; BATCH_SIZE];

        for batch in 0..BATCHES {
            let nonce = seed ^ batch.wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let mut shuffler = Shuffler::new(5, 1, PARALLELISM);
            shuffler.initialize(BATCH_SIZE, nonce);
            for i in 0..BATCH_SIZE {
                let state = QueryState(FieldElement::zero(11));
                let dest = shuffler.machine_of_next_query(i, vec![0u8], state);
                counts[i][(dest - 1) as usize] += 1;
            }
        }

        let expected = BATCHES as f64 / PARALLELISM as f64;
        for row in &counts {
            let chi_square: f64 =
                row.iter().map(|&observed| (observed as f64 - expected).powi(2) / expected).sum();
            prop_assert!(
                chi_square < CHI_SQUARE_CRITICAL_P01_DF2,
                "chi-square statistic {chi_square} exceeds the p=0.01 acceptance bound for row {row:?}"
            );
        }
    }
}
