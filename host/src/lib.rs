//! Driver for the ZK-100 grid machine
//!
//! The prover frontend hands this crate a challenge (input stream and
//! expected output stream) together with a flattened program payload,
//! and gets back the seven-element public outputs record it binds to
//! a proof:
//!
//! 1. Decode the program payload into the four cell programs.
//! 2. Derive the program commitment from the decoded instructions;
//!    the payload never carries its own commitment.
//! 3. Load a fresh grid and step it until it halts, deadlocks or hits
//!    the cycle cap.
//! 4. Compare the produced output stream against the expected one,
//!    commit to challenge and output, and assemble the record.
//!
//! The payload layout is the assembler contract: for each cell in
//! row-major order, a length prefix followed by that many encoded
//! instruction words. A truncated payload is not an error; the cells
//! past the truncation point run empty programs.

use serde::{Deserialize, Serialize};
use starknet_types_core::felt::Felt;

use zk100_core::commit;
use zk100_core::grid::Program;
use zk100_core::isa::{EncodeError, Instruction};
use zk100_core::outputs::PUBLIC_OUTPUTS_LEN;
use zk100_core::{step_cycle, GridState, PublicOutputs, StepResult, GRID_DIM, MAX_CYCLES, MAX_PROGRAM_LEN};

/// A challenge as the host tooling ships it: two `u32` streams
///
/// This mirrors the JSON challenge object; reading files is the
/// caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub inputs: Vec<u32>,
    pub expected: Vec<u32>,
}

/// Human-facing summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub solved: bool,
    pub cycles: u64,
    pub msgs: u64,
    pub nodes_used: u32,
    pub score: u64,
}

impl From<&PublicOutputs> for RunReport {
    fn from(outputs: &PublicOutputs) -> Self {
        Self {
            solved: outputs.solved,
            cycles: outputs.cycles,
            msgs: outputs.msgs,
            nodes_used: outputs.nodes_used,
            score: score(outputs),
        }
    }
}

/// Reference scoring formula, lower is better
///
/// The VM only exposes the raw counters; this is the formula the
/// leaderboard applies to them.
pub fn score(outputs: &PublicOutputs) -> u64 {
    outputs.cycles + 5 * outputs.nodes_used as u64 + outputs.msgs / 4
}

/// Decode a flattened program payload into the four cell programs
///
/// Tolerates truncation by leaving the remaining cells empty. A
/// length prefix larger than the remaining payload consumes what is
/// there; a cell keeps at most `MAX_PROGRAM_LEN` instructions either
/// way. Malformed instruction words decode to their canonical
/// fallback variants rather than failing.
pub fn decode_programs(prog_words: &[Felt]) -> [[Program; GRID_DIM]; GRID_DIM] {
    let mut programs: [[Program; GRID_DIM]; GRID_DIM] =
        [[Vec::new(), Vec::new()], [Vec::new(), Vec::new()]];
    let mut cursor = 0usize;

    for row in programs.iter_mut() {
        for program in row.iter_mut() {
            let declared = match prog_words.get(cursor) {
                Some(&word) => felt_to_u64(word),
                // Payload exhausted: this cell and the rest stay empty
                None => break,
            };
            cursor += 1;

            for _ in 0..declared {
                let word = match prog_words.get(cursor) {
                    Some(&word) => word,
                    None => break,
                };
                cursor += 1;
                if program.len() < MAX_PROGRAM_LEN {
                    program.push(Instruction::decode(felt_to_u32(word)));
                }
            }
        }
    }
    programs
}

/// Flatten cell programs into the payload layout the driver decodes
///
/// The inverse of `decode_programs` for well-formed grids: for each
/// cell in row-major order, the program length followed by the
/// canonical instruction words.
pub fn encode_programs(
    programs: &[[Program; GRID_DIM]; GRID_DIM],
) -> Result<Vec<Felt>, EncodeError> {
    let mut words = Vec::new();
    for row in programs {
        for program in row {
            words.push(Felt::from(program.len() as u64));
            for inst in program {
                words.push(Felt::from(inst.encode()?));
            }
        }
    }
    Ok(words)
}

/// Run a challenge against a program payload
///
/// Steps the grid until it halts, deadlocks or reaches `MAX_CYCLES`,
/// then assembles the public outputs. The `solved` flag compares
/// whatever the run produced against the expected stream, so a
/// deadlocked or timed-out run can still be solved when the expected
/// stream is a matching prefix it already emitted.
///
/// Payload-decoded programs always re-encode, so for payload input
/// this cannot fail; the error arm exists for hand-built programs
/// whose literals exceed the 8-bit immediate range.
pub fn run(
    inputs: &[u32],
    expected: &[u32],
    prog_words: &[Felt],
) -> Result<PublicOutputs, EncodeError> {
    let programs = decode_programs(prog_words);
    // Derived, never accepted from the caller
    let program_commitment = commit::program_commitment(&programs)?;

    let mut grid = GridState::new();
    for (row, row_programs) in programs.into_iter().enumerate() {
        for (col, program) in row_programs.into_iter().enumerate() {
            grid.load_program(row, col, program);
        }
    }
    grid.load_inputs(inputs.to_vec());
    let nodes_used = grid.nodes_used();

    tracing::info!(
        "Loaded grid: {} nodes used, {} input values, {} expected values",
        nodes_used,
        inputs.len(),
        expected.len()
    );

    let outcome = loop {
        let result = step_cycle(&mut grid);
        if result != StepResult::Continue {
            break result;
        }
        if grid.cycles >= MAX_CYCLES {
            // Cycle cap reached: treated like termination at this point
            break StepResult::Continue;
        }
    };

    let solved = grid.out_stream.as_slice() == expected;

    tracing::info!(
        "Run finished after {} cycles ({:?}): {} outputs, solved = {}",
        grid.cycles,
        outcome,
        grid.out_stream.len(),
        solved
    );

    Ok(PublicOutputs {
        challenge_commitment: commit::challenge_commitment(inputs, expected),
        program_commitment,
        output_commitment: commit::output_commitment(&grid.out_stream),
        cycles: grid.cycles,
        msgs: grid.msgs,
        nodes_used,
        solved,
    })
}

/// Run a challenge and serialize straight to the prover ABI
pub fn run_serialized(
    inputs: &[u32],
    expected: &[u32],
    prog_words: &[Felt],
) -> Result<[Felt; PUBLIC_OUTPUTS_LEN], EncodeError> {
    Ok(run(inputs, expected, prog_words)?.to_felts())
}

/// Low 8 big-endian bytes of a payload word
fn felt_to_u64(value: Felt) -> u64 {
    let bytes = value.to_bytes_be();
    let mut low = [0u8; 8];
    low.copy_from_slice(&bytes[24..32]);
    u64::from_be_bytes(low)
}

/// Low 4 big-endian bytes of a payload word
fn felt_to_u32(value: Felt) -> u32 {
    let bytes = value.to_bytes_be();
    let mut low = [0u8; 4];
    low.copy_from_slice(&bytes[28..32]);
    u32::from_be_bytes(low)
}
