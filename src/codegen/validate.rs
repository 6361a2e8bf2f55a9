use std::collections::{HashMap, HashSet};

use log::debug;

use crate::{
    error::MalformedIr,
    ir::{branch_targets, Block, BlockId, Function, Register, VRegId},
    target::Target,
};

use super::flow::FlowGraph;

/// What a single block defines and which registers it expects from elsewhere.
#[derive(Debug, Default)]
struct BlockInfo {
    defs: Vec<VRegId>,
    live_in: Vec<VRegId>,
}

/// Check that `func` is well-formed SSA.
///
/// Every block must be terminated, every branch must pass as many arguments as
/// its target has inputs, every virtual register must be defined exactly once,
/// and every use must be preceded by its definition on every path from the entry
/// block. Physical registers are not checked.
pub fn validate<T: Target>(func: &Function<T>) -> Result<(), MalformedIr> {
    if func.is_empty() {
        return Ok(());
    }

    let infos = func
        .blocks
        .iter()
        .map(|block| check_block(func, block))
        .collect::<Result<Vec<_>, _>>()?;

    let mut owner: HashMap<VRegId, BlockId> = HashMap::new();
    for (idx, info) in infos.iter().enumerate() {
        for &register in &info.defs {
            if owner.insert(register, BlockId(idx)).is_some() {
                return Err(MalformedIr::DuplicateDefinition {
                    register,
                    block: BlockId(idx),
                });
            }
        }
    }

    let cfg = FlowGraph::compute(func);
    let mut walk = PathWalk {
        infos: &infos,
        cfg: &cfg,
        on_path: vec![false; infos.len()],
        visited: vec![false; infos.len()],
        defs: HashSet::new(),
    };
    walk.visit(BlockId(0))?;

    if let Some(idx) = walk.visited.iter().position(|visited| !visited) {
        return Err(MalformedIr::UnreachableBlock { block: BlockId(idx) });
    }

    debug!("{}: {} blocks are valid SSA", func.name, infos.len());
    Ok(())
}

fn check_block<T: Target>(func: &Function<T>, block: &Block<T>) -> Result<BlockInfo, MalformedIr> {
    let mut info = BlockInfo::default();
    let mut defined = HashSet::new();

    for input in &block.inputs {
        define(&mut info, &mut defined, input.id, block.id)?;
    }

    let mut terminated = false;
    for (index, instr) in block.instrs.iter().enumerate() {
        if terminated && !instr.is_terminator() {
            return Err(MalformedIr::IllegalPostTerminatorInstruction {
                block: block.id,
                index,
            });
        }

        for vreg in instr.use_regs().filter_map(|reg| reg.as_virtual()) {
            if !defined.contains(&vreg.id) && !info.live_in.contains(&vreg.id) {
                info.live_in.push(vreg.id);
            }
        }

        for vreg in instr.defs.iter().filter_map(Register::as_virtual) {
            define(&mut info, &mut defined, vreg.id, block.id)?;
        }

        if instr.is_terminator() {
            terminated = true;

            for (_, target, args) in branch_targets(instr) {
                let expected = match func.blocks.get(target.0) {
                    Some(target_block) => target_block.inputs.len(),
                    None => {
                        return Err(MalformedIr::UnknownBlock {
                            block: block.id,
                            target,
                        })
                    }
                };

                if args.len() != expected {
                    return Err(MalformedIr::PhiArityMismatch {
                        block: block.id,
                        target,
                        expected,
                        found: args.len(),
                    });
                }
            }
        }
    }

    if !terminated {
        return Err(MalformedIr::UnterminatedBlock { block: block.id });
    }

    Ok(info)
}

fn define(
    info: &mut BlockInfo,
    defined: &mut HashSet<VRegId>,
    register: VRegId,
    block: BlockId,
) -> Result<(), MalformedIr> {
    if !defined.insert(register) {
        return Err(MalformedIr::DuplicateDefinition { register, block });
    }
    info.defs.push(register);
    Ok(())
}

/// Depth-first walk over every simple path from the entry block. Join points are
/// visited once per incoming path; only blocks already on the current path are
/// pruned.
struct PathWalk<'a> {
    infos: &'a [BlockInfo],
    cfg: &'a FlowGraph,
    on_path: Vec<bool>,
    visited: Vec<bool>,
    defs: HashSet<VRegId>,
}

impl<'a> PathWalk<'a> {
    fn visit(&mut self, block: BlockId) -> Result<(), MalformedIr> {
        let infos = self.infos;
        let info = &infos[block.0];

        if let Some(&register) = info.live_in.iter().find(|reg| !self.defs.contains(*reg)) {
            return Err(MalformedIr::UseOfUndefinedRegister { register, block });
        }

        self.visited[block.0] = true;
        self.on_path[block.0] = true;
        self.defs.extend(info.defs.iter().copied());

        let cfg = self.cfg;
        for next in cfg.succ(block) {
            if !self.on_path[next.0] {
                self.visit(next)?;
            }
        }

        for register in &info.defs {
            self.defs.remove(register);
        }
        self.on_path[block.0] = false;

        Ok(())
    }
}
