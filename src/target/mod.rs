pub mod generic;
pub mod x86;

use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

use generic::GenericOpcode;

/// A machine register.
///
/// Registers form a width hierarchy: `EAX` contains `AX`, which contains `AL`.
/// Writing any member of a hierarchy clobbers its ancestors and descendants.
pub trait PhysicalRegister: Copy + Eq + Ord + Hash + Debug + Display + 'static {
    /// The next wider register this one is part of.
    fn parent(&self) -> Option<Self> {
        None
    }

    /// Registers directly contained in this one.
    fn subregs(&self) -> &'static [Self] {
        &[]
    }

    /// True if `other` is `self` or is reachable from `other` through `parent`.
    fn is_ancestor_of(&self, other: &Self) -> bool {
        let mut cur = Some(*other);
        while let Some(reg) = cur {
            if reg == *self {
                return true;
            }
            cur = reg.parent();
        }
        false
    }

    fn aliases(&self, other: &Self) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// `self`, every ancestor and every descendant.
    fn alias_set(&self) -> Vec<Self> {
        let mut set = vec![*self];

        let mut parent = self.parent();
        while let Some(reg) = parent {
            set.push(reg);
            parent = reg.parent();
        }

        let mut stack = self.subregs().to_vec();
        while let Some(sub) = stack.pop() {
            set.push(sub);
            stack.extend_from_slice(sub.subregs());
        }

        set
    }
}

/// A set of interchangeable registers a virtual register may be assigned to.
pub trait RegisterClass: Copy + Eq + Ord + Hash + Debug + 'static {
    type Register: PhysicalRegister;

    /// Width in bits.
    fn width(&self) -> u32;

    /// Candidates in preference order.
    fn registers(&self) -> &'static [Self::Register];

    /// Bytes needed to keep a value of this class in memory. Never zero, even for
    /// a class that declares no width.
    fn spill_size(&self) -> u64 {
        ((u64::from(self.width()) + 7) / 8).max(1)
    }
}

pub trait Opcode: Copy + Eq + Hash + Debug + Display + From<GenericOpcode> + 'static {
    fn is_terminator(&self) -> bool;

    /// Pairs of `(def index, use index)` that must share one physical register.
    fn tied_defs(&self) -> &'static [(usize, usize)] {
        &[]
    }
}

/// Everything the allocator needs to know about a machine.
pub trait Target: Copy + Eq + Ord + Hash + Debug + 'static {
    type Register: PhysicalRegister;
    type Class: RegisterClass<Register = Self::Register>;
    type Opcode: Opcode;

    const NAME: &'static str;
}
