use itertools::Itertools;
use log::warn;

use crate::{
    ir::{Block, BlockId, Function, Value},
    target::Target,
};

use super::graph::{Graph, ID};

/// Blocks reachable in one step from `block`.
///
/// Only the trailing run of terminators is inspected (a conditional branch may be
/// followed by an unconditional one); scanning stops at the first
/// non-terminating instruction from the end.
pub fn successors<T: Target>(block: &Block<T>) -> Vec<BlockId> {
    block
        .instrs
        .iter()
        .rev()
        .take_while(|instr| instr.is_terminator())
        .flat_map(|instr| instr.uses.iter().filter_map(Value::as_block))
        .sorted()
        .dedup()
        .collect()
}

/// Control flow graph over the blocks of a function. Node ids coincide with
/// block ids.
pub struct FlowGraph {
    graph: Graph<BlockId>,
}

impl FlowGraph {
    pub fn compute<T: Target>(func: &Function<T>) -> Self {
        let mut graph = Graph::with_capacity(func.blocks.len());
        for block in &func.blocks {
            let id = graph.insert(block.id);
            debug_assert_eq!(id.index(), block.id.0);
        }

        for block in &func.blocks {
            for next in successors(block) {
                if next.0 >= func.blocks.len() {
                    warn!("{} branches to missing block {}", block.id, next);
                    continue;
                }
                graph.link(Self::node(block.id), Self::node(next));
            }
        }

        FlowGraph { graph }
    }

    fn node(block: BlockId) -> ID {
        // ids are dense and inserted in block order
        ID::from_index(block.0)
    }

    pub fn succ(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph.succ(Self::node(block)).map(|id| BlockId(id.index()))
    }

    pub fn pred(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph.pred(Self::node(block)).map(|id| BlockId(id.index()))
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ir::{Context, FunctionBuilder, Instruction},
        target::generic::{Generic, GenericClass, GenericOpcode},
    };

    #[test]
    fn test_successors() {
        let class = GenericClass::Gpr(4);
        let mut b = FunctionBuilder::<Generic>::new("f", Arc::new(Context::new()));
        let then = b.block();
        let els = b.block();

        // %0 = COPY 1
        // JNZ %0, block1
        // JMP block2
        let c = b.emit(GenericOpcode::Copy, class, [Value::Immediate(1)]);
        b.push(Instruction::new(GenericOpcode::Jnz).arg(c).arg(then));
        b.push(Instruction::new(GenericOpcode::Jmp).arg(els));

        // block1: JMP block2, block2 (duplicates collapse)
        b.switch_to(then);
        b.push(Instruction::new(GenericOpcode::Jmp).arg(els).arg(els));

        b.switch_to(els);
        b.push(Instruction::new(GenericOpcode::Ret));

        let func = b.finish();
        assert_eq!(successors(func.block(BlockId(0))), vec![then, els]);
        assert_eq!(successors(func.block(then)), vec![els]);
        assert!(successors(func.block(els)).is_empty());

        let cfg = FlowGraph::compute(&func);
        assert_eq!(cfg.len(), 3);
        assert_eq!(cfg.succ(BlockId(0)).collect::<Vec<_>>(), vec![then, els]);
        assert_eq!(cfg.pred(els).collect::<Vec<_>>(), vec![BlockId(0), then]);
        assert!(cfg.pred(BlockId(0)).next().is_none());
    }

    #[test]
    fn test_stop_at_non_terminator() {
        let mut b = FunctionBuilder::<Generic>::new("f", Arc::new(Context::new()));
        let other = b.block();

        // A block reference in a non-terminating instruction is not an edge.
        let r = b.emit(
            GenericOpcode::Copy,
            GenericClass::Gpr(4),
            [Value::Block(other)],
        );
        b.push(Instruction::new(GenericOpcode::Ret).arg(r));

        let func = b.finish();
        assert!(successors(func.block(BlockId(0))).is_empty());
    }
}
