//! Top-level commitments over programs, streams and challenges
//!
//! Three digests bind a run to a proof: what program grid was loaded,
//! what challenge it ran against, and what it emitted. Each one is a
//! Poseidon Merkle root (see `merkle`) over a fixed traversal order,
//! so the witness generator and the in-circuit recomputation agree on
//! every byte.

use starknet_types_core::felt::Felt;

use crate::grid::Program;
use crate::isa::EncodeError;
use crate::merkle::merkle_root;
use crate::GRID_DIM;

/// Commitment to the four cell programs
///
/// Each cell's instructions are encoded to canonical 32-bit words,
/// lifted to field elements and reduced to a per-cell Merkle root; an
/// empty program commits to `0`. The four per-cell digests are then
/// reduced in row-major cell order: (0,0), (0,1), (1,0), (1,1).
pub fn program_commitment(
    programs: &[[Program; GRID_DIM]; GRID_DIM],
) -> Result<Felt, EncodeError> {
    let mut cell_roots = Vec::with_capacity(GRID_DIM * GRID_DIM);
    for row in programs {
        for program in row {
            let mut words = Vec::with_capacity(program.len());
            for inst in program {
                words.push(Felt::from(inst.encode()?));
            }
            cell_roots.push(merkle_root(&words));
        }
    }
    Ok(merkle_root(&cell_roots))
}

/// Commitment to the produced output stream
pub fn output_commitment(out_stream: &[u32]) -> Felt {
    merkle_root(&stream_leaves(out_stream))
}

/// Commitment to a challenge: inputs and expected outputs
///
/// The two streams are committed separately and the pair of roots is
/// reduced once more, so a prover holding only one stream commitment
/// can still open its half.
pub fn challenge_commitment(inputs: &[u32], expected: &[u32]) -> Felt {
    merkle_root(&[
        merkle_root(&stream_leaves(inputs)),
        merkle_root(&stream_leaves(expected)),
    ])
}

/// Zero-extend stream values to field elements
fn stream_leaves(values: &[u32]) -> Vec<Felt> {
    values.iter().map(|&value| Felt::from(value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{Dst, Instruction, Src};
    use crate::merkle::hash_pair;

    fn empty_programs() -> [[Program; GRID_DIM]; GRID_DIM] {
        [[Vec::new(), Vec::new()], [Vec::new(), Vec::new()]]
    }

    #[test]
    fn test_empty_grid_commitment() {
        let commitment = program_commitment(&empty_programs()).unwrap();
        // Four empty cells commit to four zero leaves
        assert_eq!(
            commitment,
            merkle_root(&[Felt::ZERO, Felt::ZERO, Felt::ZERO, Felt::ZERO])
        );
    }

    #[test]
    fn test_single_cell_commitment_structure() {
        let mut programs = empty_programs();
        programs[1][1] = vec![Instruction::mov(Src::Lit(42), Dst::Out), Instruction::hlt()];

        let words = [
            Felt::from(0x2A01_0002u32),
            Felt::from(0x000D_0201u32),
        ];
        let cell_root = merkle_root(&words);
        let expected = merkle_root(&[Felt::ZERO, Felt::ZERO, Felt::ZERO, cell_root]);
        assert_eq!(program_commitment(&programs).unwrap(), expected);
    }

    #[test]
    fn test_commitment_is_position_sensitive() {
        let program = vec![Instruction::nop()];
        let mut at_origin = empty_programs();
        at_origin[0][0] = program.clone();
        let mut at_corner = empty_programs();
        at_corner[1][1] = program;

        assert_ne!(
            program_commitment(&at_origin).unwrap(),
            program_commitment(&at_corner).unwrap()
        );
    }

    #[test]
    fn test_commitment_rejects_wide_literal() {
        let mut programs = empty_programs();
        programs[0][0] = vec![Instruction::mov(Src::Lit(1000), Dst::Acc)];
        assert!(program_commitment(&programs).is_err());
    }

    #[test]
    fn test_output_commitment() {
        assert_eq!(output_commitment(&[]), Felt::ZERO);
        assert_eq!(output_commitment(&[42]), Felt::from(42u32));
        assert_eq!(
            output_commitment(&[1, 2]),
            hash_pair(Felt::from(1u32), Felt::from(2u32))
        );
    }

    #[test]
    fn test_challenge_commitment_structure() {
        let inputs = [1u32, 2, 3];
        let expected = [6u32];
        let commitment = challenge_commitment(&inputs, &expected);

        let in_root = merkle_root(&[Felt::from(1u32), Felt::from(2u32), Felt::from(3u32)]);
        assert_eq!(commitment, hash_pair(in_root, Felt::from(6u32)));
        // Two empty streams still produce a defined digest
        assert_eq!(
            challenge_commitment(&[], &[]),
            hash_pair(Felt::ZERO, Felt::ZERO)
        );
    }
}
