//! Balanced, randomised trial order.
//!
//! The session is cut into blocks of `block_size` trials.  Every block shows
//! each target exactly once, in a fresh random order, so no target can be
//! over-represented however the random source behaves.

use haptic_types::ConfigError;
use rand::Rng;
use rand::seq::SliceRandom;

/// Generate the target id for every trial of a session.
///
/// Entry `i` is the target of step `i + 1`.  The same `rng` state always
/// yields the same sequence.
///
/// # Errors
///
/// [`ConfigError::StepsNotMultipleOfBlock`] or
/// [`ConfigError::BlockSizeMismatch`] when the blocks cannot be balanced.
pub fn generate_sequence<R: Rng + ?Sized>(
    total_steps: u32,
    block_size: u32,
    target_count: usize,
    rng: &mut R,
) -> Result<Vec<usize>, ConfigError> {
    if block_size == 0 {
        return Err(ConfigError::NonPositive {
            field: "experiment.block_size",
        });
    }
    if total_steps % block_size != 0 {
        return Err(ConfigError::StepsNotMultipleOfBlock {
            total_steps,
            block_size,
        });
    }
    if block_size as usize != target_count {
        return Err(ConfigError::BlockSizeMismatch {
            block_size,
            target_count,
        });
    }

    let blocks = (total_steps / block_size) as usize;
    let mut sequence = Vec::with_capacity(total_steps as usize);
    let mut block: Vec<usize> = (0..target_count).collect();
    for _ in 0..blocks {
        block.shuffle(rng);
        sequence.extend_from_slice(&block);
    }
    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn is_permutation(block: &[usize]) -> bool {
        let mut sorted = block.to_vec();
        sorted.sort_unstable();
        sorted.iter().copied().eq(0..block.len())
    }

    #[test]
    fn every_block_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let sequence = generate_sequence(140, 10, 10, &mut rng).unwrap();
        assert_eq!(sequence.len(), 140);
        for block in sequence.chunks(10) {
            assert!(is_permutation(block), "{block:?}");
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = generate_sequence(60, 10, 10, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = generate_sequence(60, 10, 10, &mut StdRng::seed_from_u64(7)).unwrap();
        let c = generate_sequence(60, 10, 10, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_unbalanced_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            generate_sequence(25, 10, 10, &mut rng),
            Err(ConfigError::StepsNotMultipleOfBlock {
                total_steps: 25,
                block_size: 10
            })
        );
        assert_eq!(
            generate_sequence(20, 10, 9, &mut rng),
            Err(ConfigError::BlockSizeMismatch {
                block_size: 10,
                target_count: 9
            })
        );
        assert!(generate_sequence(20, 0, 0, &mut rng).is_err());
    }

    proptest! {
        #[test]
        fn blocks_stay_balanced_for_any_seed(
            seed in any::<u64>(),
            block in 1u32..16,
            blocks in 1u32..12,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let sequence =
                generate_sequence(block * blocks, block, block as usize, &mut rng).unwrap();
            prop_assert_eq!(sequence.len(), (block * blocks) as usize);
            for chunk in sequence.chunks(block as usize) {
                prop_assert!(is_permutation(chunk));
            }
        }
    }
}
