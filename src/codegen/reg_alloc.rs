use std::collections::HashSet;

use log::{debug, warn};

use crate::{
    error::UnsupportedConstruct,
    ir::{FrameSlot, Function, Register, VRegId, Value},
    target::Target,
    Error,
};

use super::{
    color::{self, Assignment, Coloring, InterferenceGraph},
    liveness, spill,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationSummary {
    /// Coloring attempts. Zero when the function had nothing to allocate.
    pub rounds: usize,
    /// Spilled registers, in spill order.
    pub spilled: Vec<VRegId>,
    pub frame_slots: Vec<FrameSlot>,
}

/// Assign a physical register to every virtual register of `func`, spilling
/// until the interference graph can be colored.
///
/// Block inputs have no register of their own to be assigned, so a function that
/// still has any is rejected before the first round.
///
/// Each round spills one register that has not been spilled before and is not a
/// reload temporary, so the number of rounds is bounded by the number of virtual
/// registers in the input.
pub fn allocate<T: Target>(func: &mut Function<T>) -> Result<AllocationSummary, Error> {
    let mut summary = AllocationSummary::default();
    if !func.has_virtual_registers() {
        debug!("{}: nothing to allocate", func.name);
        return Ok(summary);
    }

    if let Some((block, input)) = func
        .blocks
        .iter()
        .find_map(|block| block.inputs.first().map(|input| (block.id, input.id)))
    {
        return Err(UnsupportedConstruct::RemainingPhiInput {
            register: input,
            block,
        }
        .into());
    }

    let mut excluded: HashSet<VRegId> = HashSet::new();
    loop {
        summary.rounds += 1;

        let liveness = liveness::analyze(func)?;
        let graph = InterferenceGraph::build(&liveness);

        match color::color(&graph)? {
            Coloring::Colored(assignment) => {
                apply(func, &graph, &assignment);
                debug!(
                    "{}: allocated in {} rounds, {} spilled",
                    func.name,
                    summary.rounds,
                    summary.spilled.len()
                );
                return Ok(summary);
            }
            Coloring::NeedsSpill(candidates) => {
                let vreg = spill::select(func, &graph, &liveness, &candidates, &excluded)?;
                let spill = spill::rewrite(func, vreg)?;

                excluded.insert(vreg.id);
                excluded.extend(spill.reloads);
                summary.spilled.push(vreg.id);
                summary.frame_slots.push(spill.slot);
            }
        }
    }
}

/// Rewrite every virtual register operand to the color of its node.
pub fn apply<T: Target>(
    func: &mut Function<T>,
    graph: &InterferenceGraph<T>,
    assignment: &Assignment<T>,
) {
    let assign = |reg: Register<T>| match reg {
        Register::Virtual(vreg) => match graph.id(&reg).and_then(|id| assignment.get(&id)) {
            Some(&phys) => Register::Physical(phys),
            None => {
                warn!("{} has no color", vreg);
                reg
            }
        },
        Register::Physical(_) => reg,
    };

    for instr in func.blocks.iter_mut().flat_map(|block| block.instrs.iter_mut()) {
        for def in &mut instr.defs {
            *def = assign(*def);
        }
        for value in &mut instr.uses {
            if let Value::Register(reg) = value {
                *reg = assign(*reg);
            }
        }
    }
}
