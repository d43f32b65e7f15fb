//! The fixed-layout public outputs record
//!
//! Seven field elements bind a run to a proof, in this order:
//!
//! ```text
//! [ challenge_commit, program_commit, output_commit,
//!   cycles, msgs, nodes_used, solved ]
//! ```
//!
//! The record always serializes; there is no failure path on the way
//! out. Deserialization accepts exactly seven elements and nothing
//! else.

use starknet_types_core::felt::Felt;

/// Number of field elements in the serialized record
pub const PUBLIC_OUTPUTS_LEN: usize = 7;

/// Result of one VM run, as bound to a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicOutputs {
    /// Commitment to the challenge streams
    pub challenge_commitment: Felt,
    /// Commitment to the loaded program grid
    pub program_commitment: Felt,
    /// Commitment to the produced output stream
    pub output_commitment: Felt,
    /// VM cycles consumed, including the terminal one
    pub cycles: u64,
    /// Values appended to the output stream
    pub msgs: u64,
    /// Cells with a non-empty program
    pub nodes_used: u32,
    /// Whether the output stream equals the expected stream
    pub solved: bool,
}

impl PublicOutputs {
    /// Serialize to the fixed 7-element layout
    pub fn to_felts(&self) -> [Felt; PUBLIC_OUTPUTS_LEN] {
        [
            self.challenge_commitment,
            self.program_commitment,
            self.output_commitment,
            Felt::from(self.cycles),
            Felt::from(self.msgs),
            Felt::from(self.nodes_used),
            if self.solved { Felt::ONE } else { Felt::ZERO },
        ]
    }

    /// Deserialize from the fixed layout
    ///
    /// Returns `None` unless the input holds exactly seven elements.
    /// Counter elements are read from their low bytes; a well-formed
    /// record never carries more.
    pub fn from_felts(felts: &[Felt]) -> Option<Self> {
        if felts.len() != PUBLIC_OUTPUTS_LEN {
            return None;
        }
        Some(Self {
            challenge_commitment: felts[0],
            program_commitment: felts[1],
            output_commitment: felts[2],
            cycles: felt_to_u64(felts[3]),
            msgs: felt_to_u64(felts[4]),
            nodes_used: felt_to_u32(felts[5]),
            solved: felts[6] != Felt::ZERO,
        })
    }
}

/// Low 8 big-endian bytes of a field element
fn felt_to_u64(value: Felt) -> u64 {
    let bytes = value.to_bytes_be();
    let mut low = [0u8; 8];
    low.copy_from_slice(&bytes[24..32]);
    u64::from_be_bytes(low)
}

/// Low 4 big-endian bytes of a field element
fn felt_to_u32(value: Felt) -> u32 {
    let bytes = value.to_bytes_be();
    let mut low = [0u8; 4];
    low.copy_from_slice(&bytes[28..32]);
    u32::from_be_bytes(low)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PublicOutputs {
        PublicOutputs {
            challenge_commitment: Felt::from(111u64),
            program_commitment: Felt::from(222u64),
            output_commitment: Felt::from(333u64),
            cycles: 10_000,
            msgs: 12,
            nodes_used: 3,
            solved: true,
        }
    }

    #[test]
    fn test_roundtrip() {
        let outputs = sample();
        let felts = outputs.to_felts();
        assert_eq!(felts.len(), PUBLIC_OUTPUTS_LEN);
        assert_eq!(PublicOutputs::from_felts(&felts), Some(outputs));
    }

    #[test]
    fn test_roundtrip_unsolved() {
        let outputs = PublicOutputs {
            solved: false,
            ..sample()
        };
        let felts = outputs.to_felts();
        assert_eq!(felts[6], Felt::ZERO);
        assert_eq!(PublicOutputs::from_felts(&felts), Some(outputs));
    }

    #[test]
    fn test_layout_order() {
        let felts = sample().to_felts();
        assert_eq!(felts[0], Felt::from(111u64));
        assert_eq!(felts[1], Felt::from(222u64));
        assert_eq!(felts[2], Felt::from(333u64));
        assert_eq!(felts[3], Felt::from(10_000u64));
        assert_eq!(felts[4], Felt::from(12u64));
        assert_eq!(felts[5], Felt::from(3u64));
        assert_eq!(felts[6], Felt::ONE);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let felts = sample().to_felts();
        assert!(PublicOutputs::from_felts(&felts[..6]).is_none());
        let mut eight = felts.to_vec();
        eight.push(Felt::ZERO);
        assert!(PublicOutputs::from_felts(&eight).is_none());
        assert!(PublicOutputs::from_felts(&[]).is_none());
    }

    #[test]
    fn test_counter_extremes_survive() {
        let outputs = PublicOutputs {
            cycles: u64::MAX,
            msgs: 0,
            nodes_used: u32::MAX,
            ..sample()
        };
        assert_eq!(PublicOutputs::from_felts(&outputs.to_felts()), Some(outputs));
    }
}
