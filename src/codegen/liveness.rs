use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, trace};

use crate::{
    error::UnsupportedConstruct,
    ir::{Block, BlockId, Function, Register, Value},
    target::{Opcode as _, PhysicalRegister as _, Target},
};

use super::{flow::FlowGraph, union_find::UnionFind};

/// Instructions `start..=end` of `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LiveRange {
    pub block: BlockId,
    pub start: usize,
    pub end: usize,
}

impl LiveRange {
    pub fn new(block: BlockId, start: usize, end: usize) -> Self {
        Self { block, start, end }
    }

    /// Ranges that merely touch (one ends where the other starts) do not overlap.
    /// Ranges in different blocks never do.
    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.block == other.block
            && !((self.start < other.start && self.end <= other.start)
                || (other.start < self.start && other.end <= self.start))
    }
}

/// Live ranges of every register in a function and the groups of registers that
/// tied operands force into one physical register.
#[derive(Debug)]
pub struct Liveness<T: Target> {
    ranges: BTreeMap<Register<T>, Vec<LiveRange>>,
    groups: Vec<Vec<Register<T>>>,
    live_ins: Vec<BTreeSet<Register<T>>>,
}

impl<T: Target> Liveness<T> {
    pub fn registers(&self) -> impl Iterator<Item = Register<T>> + '_ {
        self.ranges.keys().copied()
    }

    /// Sorted ranges of `reg`; empty if it is never live on its own.
    pub fn ranges(&self, reg: &Register<T>) -> &[LiveRange] {
        self.ranges.get(reg).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tied groups, each sorted, ordered by their smallest member. Untied
    /// registers form singleton groups.
    pub fn groups(&self) -> &[Vec<Register<T>>] {
        &self.groups
    }

    /// Registers whose value flows into `block` from elsewhere.
    pub fn live_in(&self, block: BlockId) -> impl Iterator<Item = Register<T>> + '_ {
        self.live_ins[block.0].iter().copied()
    }
}

pub fn analyze<T: Target>(func: &Function<T>) -> Result<Liveness<T>, UnsupportedConstruct> {
    let mut state = State {
        func,
        ranges: BTreeMap::new(),
        tied: UnionFind::new(),
        tied_members: BTreeSet::new(),
        live_ins: vec![BTreeSet::new(); func.blocks.len()],
        block_defs: vec![Vec::new(); func.blocks.len()],
        def_blocks: HashMap::new(),
        full: HashSet::new(),
    };

    for block in &func.blocks {
        state.scan(block)?;
    }

    if let Some(entry) = func.entry() {
        let cfg = FlowGraph::compute(func);
        let mut walk = Refine::<T> {
            cfg: &cfg,
            path: Vec::new(),
            position: vec![None; func.blocks.len()],
            defs: HashMap::new(),
            loops: Vec::new(),
        };
        walk.visit(&mut state, entry);

        let loops = walk.loops;
        state.close_loops(&loops);
    }

    Ok(state.finish())
}

type LiveMap<T> = BTreeMap<Register<T>, usize>;

struct State<'f, T: Target> {
    func: &'f Function<T>,
    ranges: BTreeMap<Register<T>, Vec<LiveRange>>,
    tied: UnionFind<Register<T>>,
    tied_members: BTreeSet<Register<T>>,
    live_ins: Vec<BTreeSet<Register<T>>>,
    /// Virtual registers defined in each block, phi inputs included.
    block_defs: Vec<Vec<Register<T>>>,
    def_blocks: HashMap<Register<T>, BTreeSet<BlockId>>,
    /// Registers already live through a whole block.
    full: HashSet<(Register<T>, BlockId)>,
}

impl<'f, T: Target> State<'f, T> {
    /// Reverse scan of one block.
    fn scan(&mut self, block: &Block<T>) -> Result<(), UnsupportedConstruct> {
        let mut live = LiveMap::new();

        for (idx, instr) in block.instrs.iter().enumerate().rev() {
            for &def in &instr.defs {
                self.define(block.id, &mut live, def, idx);
            }

            for &(d, u) in instr.opcode.tied_defs() {
                if let (Some(&def), Some(Value::Register(used))) =
                    (instr.defs.get(d), instr.uses.get(u))
                {
                    self.tied.union(def, *used);
                    self.tied_members.insert(def);
                    self.tied_members.insert(*used);
                }
            }

            for reg in instr.use_regs() {
                live.entry(reg).or_insert(idx);
            }
        }

        for &input in &block.inputs {
            self.define(block.id, &mut live, Register::Virtual(input), 0);
        }

        for (reg, last) in live {
            if let Register::Physical(phys) = reg {
                return Err(UnsupportedConstruct::PhysicalLiveIn {
                    register: phys.to_string(),
                    block: block.id,
                });
            }

            self.push(reg, LiveRange::new(block.id, 0, last));
            self.live_ins[block.id.0].insert(reg);
        }

        Ok(())
    }

    /// `def` is written at `idx`: every live entry it aliases ends here.
    fn define(&mut self, block: BlockId, live: &mut LiveMap<T>, def: Register<T>, idx: usize) {
        let closed: Vec<_> = live
            .keys()
            .filter(|reg| aliases(reg, &def))
            .copied()
            .collect();
        let end = closed
            .iter()
            .filter_map(|reg| live.remove(reg))
            .max()
            .unwrap_or(idx);

        let key = self.key(def);
        self.push(key, LiveRange::new(block, idx, end));

        if def.is_virtual() {
            let defs = &mut self.block_defs[block.0];
            if !defs.contains(&def) {
                defs.push(def);
            }
            self.def_blocks.entry(def).or_default().insert(block);
        }
    }

    /// Physical registers of one alias family share a single range list, kept
    /// under the widest member seen so far.
    fn key(&mut self, reg: Register<T>) -> Register<T> {
        let phys = match reg {
            Register::Virtual(_) => return reg,
            Register::Physical(phys) => phys,
        };

        let family: Vec<T::Register> = self
            .ranges
            .keys()
            .filter_map(Register::as_physical)
            .filter(|other| other.aliases(&phys))
            .collect();

        let mut widest = phys;
        for other in &family {
            if other.is_ancestor_of(&widest) {
                widest = *other;
            }
        }

        for other in family.into_iter().filter(|other| *other != widest) {
            if let Some(moved) = self.ranges.remove(&Register::Physical(other)) {
                self.ranges
                    .entry(Register::Physical(widest))
                    .or_default()
                    .extend(moved);
            }
        }

        Register::Physical(widest)
    }

    fn push(&mut self, reg: Register<T>, range: LiveRange) {
        self.ranges.entry(reg).or_default().push(range);
    }

    /// Stretch the latest range of `reg` in its defining block to the block end.
    fn extend_to_end(&mut self, reg: Register<T>, block: BlockId) {
        let last = self.func.block(block).last_index();
        let range = self
            .ranges
            .get_mut(&reg)
            .and_then(|ranges| {
                ranges
                    .iter_mut()
                    .filter(|range| range.block == block)
                    .max_by_key(|range| range.start)
            });

        match range {
            Some(range) => range.end = last,
            None => trace!("{} has no range in {}", reg, block),
        }
    }

    /// Make `reg` live across all of `block`. Returns false if it already was.
    fn set_full(&mut self, reg: Register<T>, block: BlockId) -> bool {
        if !self.full.insert((reg, block)) {
            return false;
        }

        let last = self.func.block(block).last_index();
        let ranges = self.ranges.entry(reg).or_default();
        ranges.retain(|range| range.block != block);
        ranges.push(LiveRange::new(block, 0, last));
        self.live_ins[block.0].insert(reg);
        true
    }

    /// Registers that flow into a loop from outside stay live around the whole
    /// loop. Repeats until nothing changes, since extending one loop can make a
    /// register live into an enclosing one.
    fn close_loops(&mut self, loops: &[Vec<BlockId>]) {
        let mut changed = true;
        while changed {
            changed = false;

            for body in loops {
                let entering: BTreeSet<Register<T>> = body
                    .iter()
                    .flat_map(|block| self.live_ins[block.0].iter().copied())
                    .filter(|reg| {
                        self.def_blocks
                            .get(reg)
                            .map_or(true, |defs| body.iter().all(|block| !defs.contains(block)))
                    })
                    .collect();

                for reg in entering {
                    for &block in body {
                        changed |= self.set_full(reg, block);
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Liveness<T> {
        for ranges in self.ranges.values_mut() {
            ranges.sort_unstable();
            ranges.dedup();
        }

        let mut all: BTreeSet<Register<T>> = self.ranges.keys().copied().collect();
        all.extend(self.tied_members.iter().copied());

        let mut groups: Vec<Vec<Register<T>>> = Vec::new();
        let mut group_of: HashMap<Register<T>, usize> = HashMap::new();
        for reg in all {
            match self.tied.root(reg) {
                Some(root) => match group_of.get(&root) {
                    Some(&idx) => groups[idx].push(reg),
                    None => {
                        group_of.insert(root, groups.len());
                        groups.push(vec![reg]);
                    }
                },
                None => groups.push(vec![reg]),
            }
        }

        debug!(
            "{}: {} registers in {} groups",
            self.func.name,
            self.ranges.len(),
            groups.len()
        );

        Liveness {
            ranges: self.ranges,
            groups,
            live_ins: self.live_ins,
        }
    }
}

fn aliases<T: Target>(a: &Register<T>, b: &Register<T>) -> bool {
    match (a, b) {
        (Register::Physical(a), Register::Physical(b)) => a.aliases(b),
        _ => a == b,
    }
}

/// Walks every simple path from the entry block. Whenever a block needs a
/// register from elsewhere, the register is kept alive from its latest definition
/// on the current path up to that block. Each rediscovery along another path
/// extends again.
struct Refine<'a, T: Target> {
    cfg: &'a FlowGraph,
    path: Vec<BlockId>,
    position: Vec<Option<usize>>,
    defs: HashMap<Register<T>, BlockId>,
    /// Blocks from a back edge target to the end of the path.
    loops: Vec<Vec<BlockId>>,
}

impl<'a, T: Target> Refine<'a, T> {
    fn visit(&mut self, state: &mut State<'_, T>, block: BlockId) {
        self.reach(state, block);

        self.position[block.0] = Some(self.path.len());
        self.path.push(block);

        let saved: Vec<_> = state.block_defs[block.0]
            .iter()
            .map(|&reg| (reg, self.defs.insert(reg, block)))
            .collect();

        let cfg = self.cfg;
        for next in cfg.succ(block) {
            match self.position[next.0] {
                Some(pos) => {
                    trace!("back edge {} -> {}", block, next);
                    self.reach(state, next);
                    self.loops.push(self.path[pos..].to_vec());
                }
                None => self.visit(state, next),
            }
        }

        for (reg, previous) in saved.into_iter().rev() {
            match previous {
                Some(prev) => self.defs.insert(reg, prev),
                None => self.defs.remove(&reg),
            };
        }

        self.path.pop();
        self.position[block.0] = None;
    }

    /// Control enters `block` along the current path.
    fn reach(&mut self, state: &mut State<'_, T>, block: BlockId) {
        let live_in: Vec<_> = state.live_ins[block.0].iter().copied().collect();

        for reg in live_in {
            let def_block = match self.defs.get(&reg) {
                Some(&def_block) => def_block,
                None => {
                    trace!("{} is live into {} without a definition", reg, block);
                    continue;
                }
            };

            state.extend_to_end(reg, def_block);

            let after = match self.position[def_block.0] {
                Some(pos) => pos + 1,
                None => continue,
            };
            for &through in &self.path[after..] {
                state.set_full(reg, through);
            }
        }
    }
}
