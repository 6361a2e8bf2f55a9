use once_cell::sync::Lazy;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::{Opcode, PhysicalRegister, RegisterClass, Target};

/// Opcodes every target understands. The allocator itself only ever emits
/// `COPY`, `SAVE` and `RELOAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum GenericOpcode {
    Copy,

    Add,
    Sub,

    Mul,
    Div,
    Rem,

    Shl,
    Sra,
    Srl,

    Call,
    Jmp,
    Jnz,
    Ret,

    Load,
    Store,
    /// `SAVE slot, reg`
    Save,
    /// `reg = RELOAD slot`
    Reload,
}

impl Opcode for GenericOpcode {
    fn is_terminator(&self) -> bool {
        matches!(self, GenericOpcode::Jmp | GenericOpcode::Jnz | GenericOpcode::Ret)
    }
}

/// A flat register file without subregisters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum GenericRegister {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl PhysicalRegister for GenericRegister {}

static REGISTERS: Lazy<Vec<GenericRegister>> = Lazy::new(|| GenericRegister::iter().collect());

/// 64-bit general purpose registers. `Gpr(n)` restricts allocation to the first
/// `n` registers, which makes register pressure easy to dial in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GenericClass {
    Gpr(u8),
}

impl RegisterClass for GenericClass {
    type Register = GenericRegister;

    fn width(&self) -> u32 {
        64
    }

    fn registers(&self) -> &'static [GenericRegister] {
        match self {
            GenericClass::Gpr(n) => &REGISTERS[..usize::from(*n).min(REGISTERS.len())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generic;

impl Target for Generic {
    type Register = GenericRegister;
    type Class = GenericClass;
    type Opcode = GenericOpcode;

    const NAME: &'static str = "generic";
}
