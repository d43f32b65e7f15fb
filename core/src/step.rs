//! Lock-step cycle engine with rendezvous port matching
//!
//! One cycle is an atomic transition of the whole grid, computed in
//! two passes:
//!
//! 1. Intent collection: every live cell fetches its next instruction
//!    and, if it touches a port, declares a read or write intent. The
//!    pass only observes the pre-cycle snapshot; write intents carry
//!    the value to transmit, evaluated against that snapshot (an `IN`
//!    source peeks without consuming).
//! 2. Matching and effects: a write intent meets the complementary
//!    read intent on the opposite port of the adjacent cell, then each
//!    cell applies its instruction in row-major order. Cells whose
//!    rendezvous found no partner wait the cycle out with their PC
//!    unchanged.
//!
//! Nothing here suspends or schedules: a "wait" is just a cell that
//! makes no progress this cycle and retries on the next one. The same
//! grid therefore always steps to the same grid, which is what lets
//! the proving side replay the transition relation.

use crate::grid::{make_flags, GridState};
use crate::isa::{Dst, Instruction, Opcode, PortTag, Src};
use crate::GRID_DIM;

/// Outcome of one whole-grid cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// At least one cell executed an instruction
    Continue,
    /// All four cells are permanently halted
    Halted,
    /// Some cell is live but every live cell waited this cycle
    Deadlock,
}

/// A cell's declared port operation for the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    /// No port operand involved; the cell cannot block on a peer
    None,
    /// Rendezvous read on a port
    Read(PortTag),
    /// Rendezvous write carrying the already-evaluated value
    Write(PortTag, u32),
    /// Declared but never matchable: `LAST` operands, port-to-port
    /// `MOV`, and port writes whose source cannot supply a value
    Stuck,
}

/// What a cell will do this cycle, decided during intent collection
#[derive(Debug, Clone, Copy)]
enum Plan {
    /// Already halted before the cycle began
    Idle,
    /// Fetch failed: the cell halts permanently this cycle
    Halt,
    /// Execute the fetched instruction
    Exec(Instruction, Intent),
}

/// Advance the whole grid by one cycle
///
/// Increments `cycles` on every call, including the one that reports
/// `Halted` or `Deadlock`.
pub fn step_cycle(grid: &mut GridState) -> StepResult {
    // Pass 1: fetch and declare intents against the frozen snapshot.
    let mut plans = [[Plan::Idle; GRID_DIM]; GRID_DIM];
    for row in 0..GRID_DIM {
        for col in 0..GRID_DIM {
            let node = &grid.nodes[row][col];
            if node.halted {
                continue;
            }
            plans[row][col] = match grid.programs[row][col].get(node.pc as usize) {
                Some(&inst) => Plan::Exec(inst, collect_intent(grid, row, col, inst)),
                // Empty program, or the PC ran off the end
                None => Plan::Halt,
            };
        }
    }

    // Match complementary intents across shared edges. A 2x2 grid has
    // exactly one candidate peer per direction, so there are no ties.
    let mut delivered = [[None; GRID_DIM]; GRID_DIM];
    for row in 0..GRID_DIM {
        for col in 0..GRID_DIM {
            let Plan::Exec(_, intent) = plans[row][col] else {
                continue;
            };
            match intent {
                Intent::Read(port) => {
                    if let Some((nr, nc)) = neighbor(row, col, port) {
                        if let Plan::Exec(_, Intent::Write(theirs, value)) = plans[nr][nc] {
                            if theirs == port.opposite() {
                                delivered[row][col] = Some(value);
                            }
                        }
                    }
                }
                Intent::Write(port, value) => {
                    if let Some((nr, nc)) = neighbor(row, col, port) {
                        if let Plan::Exec(_, Intent::Read(theirs)) = plans[nr][nc] {
                            if theirs == port.opposite() {
                                delivered[row][col] = Some(value);
                            }
                        }
                    }
                }
                Intent::None | Intent::Stuck => {}
            }
        }
    }

    // Pass 2: apply effects cell by cell in row-major order.
    let mut any_progress = false;
    for row in 0..GRID_DIM {
        for col in 0..GRID_DIM {
            match plans[row][col] {
                Plan::Idle => {}
                Plan::Halt => {
                    let node = &mut grid.nodes[row][col];
                    node.halted = true;
                    node.blocked = false;
                }
                Plan::Exec(inst, intent) => {
                    let executed = execute(grid, row, col, inst, intent, delivered[row][col]);
                    grid.nodes[row][col].blocked = !executed;
                    if executed {
                        any_progress = true;
                    }
                }
            }
        }
    }

    grid.cycles += 1;

    let all_halted = grid.nodes.iter().flatten().all(|node| node.halted);
    if all_halted {
        StepResult::Halted
    } else if !any_progress {
        StepResult::Deadlock
    } else {
        StepResult::Continue
    }
}

/// The adjacent cell in the given direction, if any
fn neighbor(row: usize, col: usize, port: PortTag) -> Option<(usize, usize)> {
    match port {
        PortTag::Up => row.checked_sub(1).map(|r| (r, col)),
        PortTag::Down => (row + 1 < GRID_DIM).then_some((row + 1, col)),
        PortTag::Left => col.checked_sub(1).map(|c| (row, c)),
        PortTag::Right => (col + 1 < GRID_DIM).then_some((row, col + 1)),
    }
}

/// Declare the cell's port operation for this cycle
///
/// Evaluation here is peek-only: an `IN`-sourced write intent reads
/// the stream element without advancing the cursor, so a write that
/// finds no reader leaves the input untouched.
fn collect_intent(grid: &GridState, row: usize, col: usize, inst: Instruction) -> Intent {
    match inst.op {
        Opcode::Mov => match (inst.src, inst.dst) {
            // A single cell cannot complete two rendezvous in one
            // cycle, and LAST is inert in this machine revision.
            (Src::Port(_), Dst::Port(_)) => Intent::Stuck,
            (Src::Last, _) | (_, Dst::Last) => Intent::Stuck,
            (Src::Port(port), _) => Intent::Read(port),
            (src, Dst::Port(port)) => match peek_src(grid, row, col, src) {
                Some(value) => Intent::Write(port, value),
                // The source cannot supply a value, so neither can the
                // write; the peer must not see a matchable writer.
                None => Intent::Stuck,
            },
            _ => Intent::None,
        },
        Opcode::Add
        | Opcode::Sub
        | Opcode::Jmp
        | Opcode::Jz
        | Opcode::Jnz
        | Opcode::Jgz
        | Opcode::Jlz => match inst.src {
            Src::Port(port) => Intent::Read(port),
            Src::Last => Intent::Stuck,
            _ => Intent::None,
        },
        Opcode::Neg | Opcode::Sav | Opcode::Swp | Opcode::Nop | Opcode::Hlt => Intent::None,
    }
}

/// Evaluate a non-port source against the pre-cycle snapshot
fn peek_src(grid: &GridState, row: usize, col: usize, src: Src) -> Option<u32> {
    match src {
        Src::Lit(value) => Some(value),
        Src::Acc => Some(grid.nodes[row][col].acc),
        Src::Nil => Some(0),
        Src::In => {
            if (row, col) == (0, 0) {
                grid.in_stream.get(grid.in_cursor).copied()
            } else {
                // IN exists only at the top-left corner
                None
            }
        }
        Src::Port(_) | Src::Last => None,
    }
}

/// Apply one instruction; returns false when the cell waits instead
fn execute(
    grid: &mut GridState,
    row: usize,
    col: usize,
    inst: Instruction,
    intent: Intent,
    delivered: Option<u32>,
) -> bool {
    match intent {
        Intent::Stuck => return false,
        // An unmatched rendezvous waits with the PC unchanged
        Intent::Read(_) | Intent::Write(..) if delivered.is_none() => return false,
        _ => {}
    }

    match inst.op {
        Opcode::Nop | Opcode::Hlt => {
            // HLT only loops here; the cell halts when its PC runs off
            // the end of the program on a later fetch.
            grid.nodes[row][col].pc += 1;
            true
        }
        Opcode::Mov => {
            let value = match resolve_src(grid, row, col, inst.src, intent, delivered) {
                Some(value) => value,
                None => return false,
            };
            write_dst(grid, row, col, inst.dst, value);
            grid.nodes[row][col].pc += 1;
            true
        }
        Opcode::Add | Opcode::Sub => {
            let value = match resolve_src(grid, row, col, inst.src, intent, delivered) {
                Some(value) => value,
                None => return false,
            };
            let node = &mut grid.nodes[row][col];
            node.acc = if inst.op == Opcode::Add {
                node.acc.wrapping_add(value)
            } else {
                node.acc.wrapping_sub(value)
            };
            node.flags = make_flags(node.acc);
            node.pc += 1;
            true
        }
        Opcode::Neg => {
            let node = &mut grid.nodes[row][col];
            node.acc = 0u32.wrapping_sub(node.acc);
            node.flags = make_flags(node.acc);
            node.pc += 1;
            true
        }
        Opcode::Sav => {
            let node = &mut grid.nodes[row][col];
            node.bak = node.acc;
            node.pc += 1;
            true
        }
        Opcode::Swp => {
            let node = &mut grid.nodes[row][col];
            core::mem::swap(&mut node.acc, &mut node.bak);
            node.flags = make_flags(node.acc);
            node.pc += 1;
            true
        }
        Opcode::Jmp | Opcode::Jz | Opcode::Jnz | Opcode::Jgz | Opcode::Jlz => {
            // The target is resolved before the predicate, so a jump
            // with a port or IN source consumes the value even when
            // the branch is not taken.
            let target = match resolve_src(grid, row, col, inst.src, intent, delivered) {
                Some(value) => value,
                None => return false,
            };
            let node = &mut grid.nodes[row][col];
            let taken = match inst.op {
                Opcode::Jmp => true,
                Opcode::Jz => node.flags.zero,
                Opcode::Jnz => !node.flags.zero,
                Opcode::Jgz => !node.flags.zero && !node.flags.negative,
                Opcode::Jlz => node.flags.negative,
                _ => unreachable!(),
            };
            if taken {
                node.pc = target;
            } else {
                node.pc += 1;
            }
            true
        }
    }
}

/// Resolve the source operand at commit time, consuming input
///
/// Rendezvous reads take the delivered value; committed port writes
/// reuse the value peeked during intent collection and advance the
/// input cursor if it came from `IN`. Everything else reads the cell's
/// own state, consuming the input element on a direct `IN` read.
fn resolve_src(
    grid: &mut GridState,
    row: usize,
    col: usize,
    src: Src,
    intent: Intent,
    delivered: Option<u32>,
) -> Option<u32> {
    match intent {
        Intent::Read(_) => delivered,
        Intent::Write(_, value) => {
            if src == Src::In {
                grid.in_cursor += 1;
            }
            Some(value)
        }
        Intent::None | Intent::Stuck => match src {
            Src::Lit(value) => Some(value),
            Src::Acc => Some(grid.nodes[row][col].acc),
            Src::Nil => Some(0),
            Src::In => {
                if (row, col) == (0, 0) {
                    let value = grid.in_stream.get(grid.in_cursor).copied();
                    if value.is_some() {
                        grid.in_cursor += 1;
                    }
                    value
                } else {
                    None
                }
            }
            Src::Port(_) | Src::Last => None,
        },
    }
}

/// Apply the destination of a `MOV`
fn write_dst(grid: &mut GridState, row: usize, col: usize, dst: Dst, value: u32) {
    match dst {
        // MOV does not refresh flags; only arithmetic does
        Dst::Acc => grid.nodes[row][col].acc = value,
        Dst::Nil => {}
        Dst::Out => {
            if (row, col) == (GRID_DIM - 1, GRID_DIM - 1) {
                grid.out_stream.push(value);
                grid.msgs += 1;
            }
            // Anywhere else OUT absorbs the value like NIL
        }
        // The rendezvous already delivered the value to the peer
        Dst::Port(_) => {}
        // Unreachable while LAST intents are stuck; absorb regardless
        Dst::Last => {}
    }
}
