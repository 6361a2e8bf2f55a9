use std::sync::Arc;

use crate::target::Target;

use super::{BlockId, Context, Function, Instruction, Value, VirtualReg};

/// Appends instructions to a [`Function`] block by block.
///
/// The entry block is created up front and is the initial insertion point.
pub struct FunctionBuilder<T: Target> {
    func: Function<T>,
    current: BlockId,
}

impl<T: Target> FunctionBuilder<T> {
    pub fn new(name: impl Into<String>, ctx: Arc<Context>) -> Self {
        let mut func = Function::new(name, ctx);
        let current = func.add_block();
        Self { func, current }
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn current(&self) -> BlockId {
        self.current
    }

    /// Create a new block. The insertion point stays where it is.
    pub fn block(&mut self) -> BlockId {
        self.func.add_block()
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn vreg(&self, class: T::Class) -> VirtualReg<T::Class> {
        self.func.ctx().new_vreg(class)
    }

    /// Append a phi input to `block`.
    pub fn input(&mut self, block: BlockId, class: T::Class) -> VirtualReg<T::Class> {
        let vreg = self.vreg(class);
        self.func.block_mut(block).inputs.push(vreg);
        vreg
    }

    pub fn push(&mut self, instr: Instruction<T>) {
        self.func.block_mut(self.current).instrs.push(instr);
    }

    /// Append `opcode` with `args`, defining a fresh register of `class`.
    pub fn emit<I>(
        &mut self,
        opcode: impl Into<T::Opcode>,
        class: T::Class,
        args: I,
    ) -> VirtualReg<T::Class>
    where
        I: IntoIterator<Item = Value<T>>,
    {
        let def = self.vreg(class);
        let mut instr = Instruction::new(opcode).def(def);
        instr.uses.extend(args);
        self.push(instr);
        def
    }

    pub fn finish(self) -> Function<T> {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::generic::{Generic, GenericClass, GenericOpcode};

    #[test]
    fn test_build() {
        let class = GenericClass::Gpr(2);
        let mut b = FunctionBuilder::<Generic>::new("f", Arc::new(Context::new()));
        let exit = b.block();
        let x = b.emit(GenericOpcode::Copy, class, [Value::Immediate(1)]);
        b.push(Instruction::new(GenericOpcode::Jmp).arg(exit).arg(x));

        let p = b.input(exit, class);
        b.switch_to(exit);
        b.push(Instruction::new(GenericOpcode::Ret).arg(p));

        let func = b.finish();
        assert_eq!(func.blocks.len(), 2);
        assert_eq!(func.block(exit).inputs, vec![p]);
        assert_eq!(func.block(BlockId(0)).instrs.len(), 2);
        assert_ne!(x.id, p.id);
    }
}
