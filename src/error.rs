use thiserror::Error;

use crate::ir::{BlockId, VRegId};

/// Structural problems in the input IR. Always reported before any pass mutates
/// the function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedIr {
    #[error("{register} is defined more than once (again in {block})")]
    DuplicateDefinition { register: VRegId, block: BlockId },

    #[error("{block} does not end with a terminator")]
    UnterminatedBlock { block: BlockId },

    #[error("instruction {index} of {block} follows a terminator")]
    IllegalPostTerminatorInstruction { block: BlockId, index: usize },

    #[error("{block} passes {found} arguments to {target}, which takes {expected}")]
    PhiArityMismatch {
        block: BlockId,
        target: BlockId,
        expected: usize,
        found: usize,
    },

    #[error("{register} is used in {block} without a definition on some path")]
    UseOfUndefinedRegister { register: VRegId, block: BlockId },

    #[error("{block} is unreachable from the entry block")]
    UnreachableBlock { block: BlockId },

    #[error("{block} branches to {target}, which does not exist")]
    UnknownBlock { block: BlockId, target: BlockId },
}

/// Well-formed IR the allocator cannot handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedConstruct {
    #[error("cannot spill {register}: {block} still has phi inputs")]
    SpillBeforePhiElimination { register: VRegId, block: BlockId },

    #[error("{first} and {second} are tied together")]
    ConflictingTiedRegisters { first: String, second: String },

    #[error("physical register {register} is live into {block}")]
    PhysicalLiveIn { register: String, block: BlockId },

    #[error("input {register} of {block} is not supplied by any predecessor")]
    UnsuppliedPhiInput { register: VRegId, block: BlockId },

    #[error("{block} still takes input {register}; phis must be eliminated first")]
    RemainingPhiInput { register: VRegId, block: BlockId },
}

/// Coloring failed and no remaining register can be spilled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no spill candidate left for `{function}`")]
pub struct AllocationImpossible {
    pub function: String,
}
