//! Architecture-neutral SSA IR.
//!
//! A [`Function`] is an arena of [`Block`]s indexed by [`BlockId`]; the first block
//! is the entry. Blocks take phi inputs as parameters and end with one or more
//! terminators whose [`Value::Block`] operands form the CFG edges. Operands that
//! follow a block reference (up to the next block reference) are the phi
//! arguments passed to that block.

mod builder;
mod context;
mod display;

use std::sync::Arc;

use crate::target::{Opcode as _, Target};

pub use builder::FunctionBuilder;
pub use context::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VRegId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualReg<C> {
    pub id: VRegId,
    pub class: C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register<T: Target> {
    Virtual(VirtualReg<T::Class>),
    Physical(T::Register),
}

impl<T: Target> Register<T> {
    pub fn is_virtual(&self) -> bool {
        matches!(self, Register::Virtual(_))
    }

    pub fn as_virtual(&self) -> Option<VirtualReg<T::Class>> {
        match self {
            Register::Virtual(vreg) => Some(*vreg),
            Register::Physical(_) => None,
        }
    }

    pub fn as_physical(&self) -> Option<T::Register> {
        match self {
            Register::Virtual(_) => None,
            Register::Physical(reg) => Some(*reg),
        }
    }
}

impl<T: Target> From<VirtualReg<T::Class>> for Register<T> {
    fn from(vreg: VirtualReg<T::Class>) -> Self {
        Register::Virtual(vreg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameSlot {
    pub id: u32,
    /// In bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<T: Target> {
    Register(Register<T>),
    Immediate(i64),
    Frame { slot: FrameSlot, offset: i64 },
    Global(String),
    Block(BlockId),
}

impl<T: Target> Value<T> {
    pub fn as_register(&self) -> Option<Register<T>> {
        match self {
            Value::Register(reg) => Some(*reg),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<BlockId> {
        match self {
            Value::Block(id) => Some(*id),
            _ => None,
        }
    }
}

impl<T: Target> From<Register<T>> for Value<T> {
    fn from(reg: Register<T>) -> Self {
        Value::Register(reg)
    }
}

impl<T: Target> From<VirtualReg<T::Class>> for Value<T> {
    fn from(vreg: VirtualReg<T::Class>) -> Self {
        Value::Register(Register::Virtual(vreg))
    }
}

impl<T: Target> From<i64> for Value<T> {
    fn from(imm: i64) -> Self {
        Value::Immediate(imm)
    }
}

impl<T: Target> From<BlockId> for Value<T> {
    fn from(id: BlockId) -> Self {
        Value::Block(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction<T: Target> {
    pub opcode: T::Opcode,
    pub defs: Vec<Register<T>>,
    pub uses: Vec<Value<T>>,
}

impl<T: Target> Instruction<T> {
    pub fn new(opcode: impl Into<T::Opcode>) -> Self {
        Self {
            opcode: opcode.into(),
            defs: Vec::new(),
            uses: Vec::new(),
        }
    }

    pub fn def(mut self, reg: impl Into<Register<T>>) -> Self {
        self.defs.push(reg.into());
        self
    }

    pub fn arg(mut self, value: impl Into<Value<T>>) -> Self {
        self.uses.push(value.into());
        self
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    /// Registers read by this instruction.
    pub fn use_regs(&self) -> impl Iterator<Item = Register<T>> + '_ {
        self.uses.iter().filter_map(Value::as_register)
    }

    /// Every register operand, defs first.
    pub fn regs(&self) -> impl Iterator<Item = Register<T>> + '_ {
        self.defs.iter().copied().chain(self.use_regs())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<T: Target> {
    pub id: BlockId,
    pub inputs: Vec<VirtualReg<T::Class>>,
    pub instrs: Vec<Instruction<T>>,
}

impl<T: Target> Block<T> {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            inputs: Vec::new(),
            instrs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Index of the last instruction; `0` for an empty block.
    pub fn last_index(&self) -> usize {
        self.instrs.len().saturating_sub(1)
    }

    /// Index of the first instruction of the trailing run of terminators.
    pub fn terminator_start(&self) -> usize {
        self.instrs
            .iter()
            .rposition(|instr| !instr.is_terminator())
            .map_or(0, |idx| idx + 1)
    }
}

#[derive(Debug, Clone)]
pub struct Function<T: Target> {
    pub name: String,
    pub blocks: Vec<Block<T>>,
    ctx: Arc<Context>,
}

impl<T: Target> Function<T> {
    pub fn new(name: impl Into<String>, ctx: Arc<Context>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            ctx,
        }
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn shared_ctx(&self) -> Arc<Context> {
        Arc::clone(&self.ctx)
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block::new(id));
        id
    }

    pub fn block(&self, id: BlockId) -> &Block<T> {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block<T> {
        &mut self.blocks[id.0]
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().map(|block| block.id)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction<T>> + '_ {
        self.blocks.iter().flat_map(|block| block.instrs.iter())
    }

    pub fn has_virtual_registers(&self) -> bool {
        self.blocks.iter().any(|block| !block.inputs.is_empty())
            || self
                .instructions()
                .any(|instr| instr.regs().any(|reg| reg.is_virtual()))
    }
}

/// Phi arguments passed by a terminator: for every block reference, the target
/// and the operand positions of its arguments.
pub(crate) fn branch_targets<T: Target>(
    instr: &Instruction<T>,
) -> Vec<(usize, BlockId, Vec<usize>)> {
    let mut targets: Vec<(usize, BlockId, Vec<usize>)> = Vec::new();
    for (idx, value) in instr.uses.iter().enumerate() {
        if let Some(target) = value.as_block() {
            targets.push((idx, target, Vec::new()));
        } else if let Some((_, _, args)) = targets.last_mut() {
            args.push(idx);
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::generic::{Generic, GenericClass, GenericOpcode};

    #[test]
    fn test_branch_targets() {
        let ctx = Context::new();
        let c = ctx.new_vreg(GenericClass::Gpr(4));
        let a = ctx.new_vreg(GenericClass::Gpr(4));

        // JNZ %c, block1, block2(%a, 7)
        let instr = Instruction::<Generic>::new(GenericOpcode::Jnz)
            .arg(c)
            .arg(BlockId(1))
            .arg(BlockId(2))
            .arg(a)
            .arg(7i64);

        assert_eq!(
            branch_targets(&instr),
            vec![(1, BlockId(1), vec![]), (2, BlockId(2), vec![3, 4])]
        );
    }

    #[test]
    fn test_terminator_start() {
        let ctx = Arc::new(Context::new());
        let mut func = Function::<Generic>::new("f", ctx.clone());
        let b0 = func.add_block();
        let b1 = func.add_block();
        let r = ctx.new_vreg(GenericClass::Gpr(4));

        let block = func.block_mut(b0);
        block.instrs.push(Instruction::new(GenericOpcode::Copy).def(r).arg(1i64));
        block
            .instrs
            .push(Instruction::new(GenericOpcode::Jnz).arg(r).arg(b1));
        block.instrs.push(Instruction::new(GenericOpcode::Jmp).arg(b1));

        assert_eq!(func.block(b0).terminator_start(), 1);
        assert_eq!(func.block(b0).last_index(), 2);
        assert_eq!(func.block(b1).terminator_start(), 0);
        assert!(func.has_virtual_registers());
    }
}
