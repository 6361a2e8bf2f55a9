use std::fmt::{self, Display};

use itertools::Itertools;

use crate::target::Target;

use super::{Block, BlockId, FrameSlot, Function, Instruction, Register, VRegId, Value, VirtualReg};

impl Display for VRegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl<C> Display for VirtualReg<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T: Target> Display for Register<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Virtual(vreg) => write!(f, "{}", vreg),
            Register::Physical(reg) => write!(f, "{}", reg),
        }
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}

impl Display for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(FRAME {} {})", self.id, self.size)
    }
}

impl<T: Target> Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Register(reg) => write!(f, "{}", reg),
            Value::Immediate(imm) => write!(f, "{}", imm),
            Value::Frame { slot, offset: 0 } => write!(f, "{}", slot),
            Value::Frame { slot, offset } => write!(f, "{}{:+}", slot, offset),
            Value::Global(name) => write!(f, "@{}", name),
            Value::Block(id) => write!(f, "{}", id),
        }
    }
}

impl<T: Target> Display for Instruction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.defs.is_empty() {
            write!(f, "{} = ", self.defs.iter().format(", "))?;
        }
        write!(f, "{}", self.opcode)?;
        if !self.uses.is_empty() {
            write!(f, " {}", self.uses.iter().format(", "))?;
        }
        Ok(())
    }
}

impl<T: Target> Display for Block<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}({}):", self.id, self.inputs.iter().format(", "))?;
        for instr in &self.instrs {
            writeln!(f, "    {}", instr)?;
        }
        Ok(())
    }
}

impl<T: Target> Display for Function<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {{", self.name)?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ir::{Context, FunctionBuilder},
        target::x86::{X86Class, X86Opcode, X86Register, X86},
        target::generic::GenericOpcode,
    };

    #[test]
    fn test_print() {
        let ctx = Arc::new(Context::new());
        let mut b = FunctionBuilder::<X86>::new("sum", ctx.clone());
        let next = b.block();
        let x = b.emit(GenericOpcode::Copy, X86Class::Gr32, [Value::Immediate(1)]);
        let y = b.emit(
            GenericOpcode::Load,
            X86Class::Gr32,
            [Value::Global("foo".to_string())],
        );
        b.push(Instruction::new(X86Opcode::Add).def(x).arg(x).arg(y));
        b.push(
            Instruction::new(GenericOpcode::Jmp)
                .arg(next)
                .arg(Register::<X86>::Physical(X86Register::Eax)),
        );
        let p = b.input(next, X86Class::Gr32);
        b.switch_to(next);
        let slot = ctx.new_frame_slot(4);
        b.push(
            Instruction::new(GenericOpcode::Save)
                .arg(Value::Frame { slot, offset: 0 })
                .arg(p),
        );
        b.push(
            Instruction::new(GenericOpcode::Ret).arg(Value::<X86>::Frame { slot, offset: -4 }),
        );

        let expected = "\
sum {
block0():
    %0 = COPY 1
    %1 = LOAD @foo
    %0 = X86::ADD %0, %1
    JMP block1, EAX
block1(%2):
    SAVE (FRAME 0 4), %2
    RET (FRAME 0 4)-4
}";
        assert_eq!(b.finish().to_string(), expected);
    }
}
