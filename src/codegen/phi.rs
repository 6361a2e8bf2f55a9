use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::{
    error::UnsupportedConstruct,
    ir::{branch_targets, Block, BlockId, Function, Instruction, VRegId, VirtualReg},
    target::{generic::GenericOpcode, Target},
};

/// Replace block inputs with copies.
///
/// Every phi input `%p` gets one primed register `%p'` shared by all
/// predecessors. Each predecessor copies its argument into `%p'` right before its
/// terminators and the target block starts with `%p = COPY %p'`. Branch
/// arguments and block inputs are removed.
///
/// When one terminator run reaches the same target more than once (`JNZ %c,
/// block1(%c); JMP block1(5)`), every such edge is split: the copies move into a
/// new block appended to the function, which jumps on to the target.
///
/// The primed registers are defined once per predecessor, so the result is no
/// longer strict SSA. Only run this on validated functions.
pub fn eliminate<T: Target>(func: &mut Function<T>) -> Result<(), UnsupportedConstruct> {
    let supplied: HashSet<BlockId> = func
        .instructions()
        .filter(|instr| instr.is_terminator())
        .flat_map(branch_targets)
        .map(|(_, target, _)| target)
        .collect();

    for block in &func.blocks {
        if let Some(input) = block.inputs.first() {
            if !supplied.contains(&block.id) {
                return Err(UnsupportedConstruct::UnsuppliedPhiInput {
                    register: input.id,
                    block: block.id,
                });
            }
        }
    }

    let ctx = func.shared_ctx();
    let inputs: Vec<Vec<VirtualReg<T::Class>>> =
        func.blocks.iter().map(|block| block.inputs.clone()).collect();
    let mut primed: HashMap<VRegId, VirtualReg<T::Class>> = HashMap::new();
    let first_edge = func.blocks.len();
    let mut edges: Vec<Block<T>> = Vec::new();

    for block in &mut func.blocks {
        let start = block.terminator_start();
        let mut copies: Vec<Instruction<T>> = Vec::new();

        let mut referenced: HashMap<BlockId, usize> = HashMap::new();
        for (_, target, _) in block.instrs[start..].iter().flat_map(branch_targets) {
            if !inputs[target.0].is_empty() {
                *referenced.entry(target).or_default() += 1;
            }
        }

        for instr in &mut block.instrs[start..] {
            let mut dropped = Vec::new();

            for (pos, target, args) in branch_targets(instr) {
                if inputs[target.0].is_empty() {
                    continue;
                }

                let mut primes = Vec::with_capacity(args.len());
                for (phi, &arg) in inputs[target.0].iter().zip(&args) {
                    let prime = *primed
                        .entry(phi.id)
                        .or_insert_with(|| ctx.new_vreg(phi.class));
                    primes.push(
                        Instruction::new(GenericOpcode::Copy)
                            .def(prime)
                            .arg(instr.uses[arg].clone()),
                    );
                }
                dropped.extend(args);

                // Copies for a target reached twice from one run would clobber
                // each other, so each of those edges gets its own block.
                if referenced.get(&target).copied().unwrap_or_default() > 1 {
                    let mut edge = Block::new(BlockId(first_edge + edges.len()));
                    edge.instrs = primes;
                    edge.instrs.push(Instruction::new(GenericOpcode::Jmp).arg(target));
                    trace!("{} -> {} through {}", block.id, target, edge.id);
                    instr.uses[pos] = edge.id.into();
                    edges.push(edge);
                } else {
                    copies.extend(primes);
                }
            }

            let mut idx = 0;
            instr.uses.retain(|_| {
                let keep = !dropped.contains(&idx);
                idx += 1;
                keep
            });
        }

        if !copies.is_empty() {
            trace!("{}: {} phi copies", block.id, copies.len());
            block.instrs.splice(start..start, copies);
        }
    }

    if !edges.is_empty() {
        debug!("{}: split {} edges", func.name, edges.len());
        func.blocks.extend(edges);
    }

    for block in &mut func.blocks {
        if block.inputs.is_empty() {
            continue;
        }

        let head = block.inputs.drain(..).map(|phi| {
            Instruction::<T>::new(GenericOpcode::Copy)
                .def(phi)
                .arg(primed[&phi.id])
        });
        block.instrs.splice(0..0, head);
    }

    debug!("{}: eliminated {} phi inputs", func.name, primed.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ir::{Context, FunctionBuilder, Value},
        target::generic::{Generic, GenericClass},
    };

    const CLASS: GenericClass = GenericClass::Gpr(4);

    #[test]
    fn test_eliminate_diamond() {
        let mut b = FunctionBuilder::<Generic>::new("f", Arc::new(Context::new()));
        let then = b.block();
        let els = b.block();
        let join = b.block();

        let c = b.emit(GenericOpcode::Copy, CLASS, [Value::Immediate(1)]);
        b.push(
            Instruction::new(GenericOpcode::Jnz)
                .arg(c)
                .arg(then)
                .arg(els),
        );

        b.switch_to(then);
        b.push(Instruction::new(GenericOpcode::Jmp).arg(join).arg(c).arg(2i64));

        b.switch_to(els);
        b.push(Instruction::new(GenericOpcode::Jmp).arg(join).arg(3i64).arg(c));

        let p = b.input(join, CLASS);
        let q = b.input(join, CLASS);
        b.switch_to(join);
        b.push(Instruction::new(GenericOpcode::Ret).arg(p).arg(q));

        let mut func = b.finish();
        eliminate(&mut func).unwrap();

        let expected = "\
f {
block0():
    %0 = COPY 1
    JNZ %0, block1, block2
block1():
    %3 = COPY %0
    %4 = COPY 2
    JMP block3
block2():
    %3 = COPY 3
    %4 = COPY %0
    JMP block3
block3():
    %1 = COPY %3
    %2 = COPY %4
    RET %1, %2
}";
        assert_eq!(func.to_string(), expected);
    }

    #[test]
    fn test_split_repeated_target() {
        // block0: JNZ %0, block1(%0); JMP block1(5)
        let mut b = FunctionBuilder::<Generic>::new("f", Arc::new(Context::new()));
        let next = b.block();
        let c = b.emit(GenericOpcode::Copy, CLASS, [Value::Immediate(1)]);
        b.push(
            Instruction::new(GenericOpcode::Jnz)
                .arg(c)
                .arg(next)
                .arg(c),
        );
        b.push(Instruction::new(GenericOpcode::Jmp).arg(next).arg(5i64));

        let p = b.input(next, CLASS);
        b.switch_to(next);
        b.push(Instruction::new(GenericOpcode::Ret).arg(p));

        let mut func = b.finish();
        eliminate(&mut func).unwrap();

        let expected = "\
f {
block0():
    %0 = COPY 1
    JNZ %0, block2
    JMP block3
block1():
    %1 = COPY %2
    RET %1
block2():
    %2 = COPY %0
    JMP block1
block3():
    %2 = COPY 5
    JMP block1
}";
        assert_eq!(func.to_string(), expected);
    }

    #[test]
    fn test_distinct_targets_share_run() {
        // block0: JNZ %0, block1(%0); JMP block2(7)
        let mut b = FunctionBuilder::<Generic>::new("f", Arc::new(Context::new()));
        let one = b.block();
        let two = b.block();
        let c = b.emit(GenericOpcode::Copy, CLASS, [Value::Immediate(0)]);
        b.push(Instruction::new(GenericOpcode::Jnz).arg(c).arg(one).arg(c));
        b.push(Instruction::new(GenericOpcode::Jmp).arg(two).arg(7i64));

        let p = b.input(one, CLASS);
        b.switch_to(one);
        b.push(Instruction::new(GenericOpcode::Ret).arg(p));

        let q = b.input(two, CLASS);
        b.switch_to(two);
        b.push(Instruction::new(GenericOpcode::Ret).arg(q));

        let mut func = b.finish();
        eliminate(&mut func).unwrap();

        assert_eq!(func.blocks.len(), 3);
        let entry = func.block(BlockId(0));
        assert_eq!(entry.terminator_start(), 3);
        assert_eq!(entry.instrs[1].to_string(), "%3 = COPY %0");
        assert_eq!(entry.instrs[2].to_string(), "%4 = COPY 7");
        assert_eq!(entry.instrs[3].to_string(), "JNZ %0, block1");
        assert_eq!(entry.instrs[4].to_string(), "JMP block2");
    }

    #[test]
    fn test_unsupplied_input() {
        let mut b = FunctionBuilder::<Generic>::new("f", Arc::new(Context::new()));
        let p = b.input(BlockId(0), CLASS);
        b.push(Instruction::new(GenericOpcode::Ret).arg(p));

        let mut func = b.finish();
        assert_eq!(
            eliminate(&mut func),
            Err(UnsupportedConstruct::UnsuppliedPhiInput {
                register: p.id,
                block: BlockId(0)
            })
        );
        assert_eq!(func.block(BlockId(0)).inputs, vec![p]);
    }
}
