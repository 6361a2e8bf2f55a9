use std::collections::{BTreeMap, HashSet};

use log::{debug, trace};

use crate::{
    error::{AllocationImpossible, UnsupportedConstruct},
    ir::{BlockId, FrameSlot, Function, Instruction, Register, VRegId, Value, VirtualReg},
    target::{generic::GenericOpcode, RegisterClass as _, Target},
};

use super::{
    color::{InterferenceGraph, SpillCandidates},
    liveness::{LiveRange, Liveness},
};

/// Code inserted for one spilled register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spill {
    pub slot: FrameSlot,
    /// Registers defined by the inserted `RELOAD`s.
    pub reloads: Vec<VRegId>,
}

/// Pick the candidate register whose spilling frees the most.
///
/// A register's cost is how often its node was involved in a failure times the
/// number of instructions it is live across. Physical registers and anything in
/// `excluded` are never picked. Ties go to the lowest register.
pub fn select<T: Target>(
    func: &Function<T>,
    graph: &InterferenceGraph<T>,
    liveness: &Liveness<T>,
    candidates: &SpillCandidates,
    excluded: &HashSet<VRegId>,
) -> Result<VirtualReg<T::Class>, AllocationImpossible> {
    let mut eligible: Vec<(VirtualReg<T::Class>, u32)> = candidates
        .iter()
        .flat_map(|(&id, &occurrences)| {
            graph
                .registers(id)
                .iter()
                .filter_map(Register::as_virtual)
                .map(move |vreg| (vreg, occurrences))
        })
        .filter(|(vreg, _)| !excluded.contains(&vreg.id))
        .collect();
    eligible.sort();

    let mut best: Option<(VirtualReg<T::Class>, u64)> = None;
    for (vreg, occurrences) in eligible {
        let cost = u64::from(occurrences) * span(liveness.ranges(&vreg.into()));
        trace!("spill cost of {}: {}", vreg, cost);
        if best.map_or(true, |(_, best_cost)| cost > best_cost) {
            best = Some((vreg, cost));
        }
    }

    match best {
        Some((vreg, cost)) => {
            debug!("{}: spilling {} (cost {})", func.name, vreg, cost);
            Ok(vreg)
        }
        None => Err(AllocationImpossible {
            function: func.name.clone(),
        }),
    }
}

/// Instructions covered, counted per block from the earliest start to the latest
/// end.
fn span(ranges: &[LiveRange]) -> u64 {
    let mut blocks: BTreeMap<BlockId, (usize, usize)> = BTreeMap::new();
    for range in ranges {
        let (start, end) = blocks
            .entry(range.block)
            .or_insert((range.start, range.end));
        *start = (*start).min(range.start);
        *end = (*end).max(range.end);
    }

    blocks
        .values()
        .map(|(start, end)| (end - start + 1) as u64)
        .sum()
}

/// Keep `vreg` in a fresh frame slot: reload it before every instruction that
/// reads it and save it after every instruction that writes it.
///
/// Reloads for terminators are placed ahead of the block's whole terminator run,
/// which has to stay contiguous for the CFG to see every edge.
pub fn rewrite<T: Target>(
    func: &mut Function<T>,
    vreg: VirtualReg<T::Class>,
) -> Result<Spill, UnsupportedConstruct> {
    let reg = Register::Virtual(vreg);

    for block in &func.blocks {
        let mentioned = block.inputs.contains(&vreg)
            || block
                .instrs
                .iter()
                .any(|instr| instr.regs().any(|other| other == reg));
        if mentioned && !block.inputs.is_empty() {
            return Err(UnsupportedConstruct::SpillBeforePhiElimination {
                register: vreg.id,
                block: block.id,
            });
        }
    }

    let ctx = func.shared_ctx();
    let slot = ctx.new_frame_slot(vreg.class.spill_size());
    let memory: Value<T> = Value::Frame { slot, offset: 0 };
    let mut reloads = Vec::new();

    for block in &mut func.blocks {
        let start = block.terminator_start();
        let old = std::mem::take(&mut block.instrs);
        let mut instrs = Vec::with_capacity(old.len());
        let mut run = Vec::new();

        for (idx, mut instr) in old.into_iter().enumerate() {
            if instr.use_regs().any(|other| other == reg) {
                let fresh = ctx.new_vreg(vreg.class);
                instrs.push(
                    Instruction::<T>::new(GenericOpcode::Reload)
                        .def(fresh)
                        .arg(memory.clone()),
                );
                for value in &mut instr.uses {
                    if value.as_register() == Some(reg) {
                        *value = fresh.into();
                    }
                }
                reloads.push(fresh.id);
            }

            if idx >= start {
                run.push(instr);
                continue;
            }

            let saves = instr.defs.contains(&reg);
            instrs.push(instr);
            if saves {
                instrs.push(
                    Instruction::new(GenericOpcode::Save)
                        .arg(memory.clone())
                        .arg(reg),
                );
            }
        }

        instrs.extend(run);
        block.instrs = instrs;
    }

    debug!(
        "{}: {} -> {}, {} reloads",
        func.name,
        vreg,
        slot,
        reloads.len()
    );
    Ok(Spill { slot, reloads })
}
