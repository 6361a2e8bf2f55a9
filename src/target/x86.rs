use std::{collections::HashMap, fmt};

use itertools::Itertools;
use once_cell::sync::Lazy;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use super::{generic::GenericOpcode, Opcode, PhysicalRegister, RegisterClass, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum X86Register {
    Eax,
    Ebx,
    Ecx,
    Edx,
    Edi,
    Esi,

    Ax,
    Bx,
    Cx,
    Dx,
    Di,
    Si,

    Al,
    Bl,
    Cl,
    Dl,

    Eflags,
}

static SUBREGS: Lazy<HashMap<X86Register, Vec<X86Register>>> = Lazy::new(|| {
    X86Register::iter()
        .filter_map(|reg| reg.parent().map(|parent| (parent, reg)))
        .into_group_map()
});

impl PhysicalRegister for X86Register {
    fn parent(&self) -> Option<Self> {
        use X86Register::*;

        match self {
            Ax => Some(Eax),
            Bx => Some(Ebx),
            Cx => Some(Ecx),
            Dx => Some(Edx),
            Di => Some(Edi),
            Si => Some(Esi),
            Al => Some(Ax),
            Bl => Some(Bx),
            Cl => Some(Cx),
            Dl => Some(Dx),
            _ => None,
        }
    }

    fn subregs(&self) -> &'static [Self] {
        SUBREGS.get(self).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum X86Class {
    Flags,
    Gr8,
    Gr16,
    Gr32,
}

impl RegisterClass for X86Class {
    type Register = X86Register;

    fn width(&self) -> u32 {
        match self {
            // not really, but a spilled flag still takes a byte.
            X86Class::Flags => 1,
            X86Class::Gr8 => 8,
            X86Class::Gr16 => 16,
            X86Class::Gr32 => 32,
        }
    }

    fn registers(&self) -> &'static [X86Register] {
        use X86Register::*;

        match self {
            X86Class::Flags => &[Eflags],
            X86Class::Gr8 => &[Al, Cl, Dl, Bl],
            X86Class::Gr16 => &[Ax, Cx, Dx, Si, Di, Bx],
            // ESI, EDI and EBX are callee saved.
            X86Class::Gr32 => &[Eax, Ecx, Edx],
        }
    }
}

/// Two-address x86 instructions, plus the generic opcodes that have not been
/// legalized (yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum X86Opcode {
    Generic(GenericOpcode),

    Add,
    Sub,
    IMul,
    Cdq,
    IDiv,
    Shl,
    Cmp,
    Push,
    Pop,
}

impl From<GenericOpcode> for X86Opcode {
    fn from(op: GenericOpcode) -> Self {
        X86Opcode::Generic(op)
    }
}

impl fmt::Display for X86Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            X86Opcode::Generic(op) => write!(f, "{}", op),
            op => write!(f, "X86::{}", <&'static str>::from(op)),
        }
    }
}

impl Opcode for X86Opcode {
    fn is_terminator(&self) -> bool {
        match self {
            X86Opcode::Generic(op) => op.is_terminator(),
            _ => false,
        }
    }

    fn tied_defs(&self) -> &'static [(usize, usize)] {
        match self {
            // d0 = add u0, u1   (d0 and u0 tied)
            X86Opcode::Add | X86Opcode::Sub | X86Opcode::IMul | X86Opcode::Shl => &[(0, 0)],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct X86;

impl Target for X86 {
    type Register = X86Register;
    type Class = X86Class;
    type Opcode = X86Opcode;

    const NAME: &'static str = "x86";
}
