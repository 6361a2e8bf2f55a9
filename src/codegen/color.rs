use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, HashSet},
};

use log::{debug, trace};

use crate::{
    error::UnsupportedConstruct,
    ir::Register,
    target::{PhysicalRegister as _, RegisterClass as _, Target},
};

use super::{
    graph::{Graph, ID},
    liveness::Liveness,
};

pub type Assignment<T> = HashMap<ID, <T as Target>::Register>;
/// Node → number of times it failed or blocked a failing neighbour.
pub type SpillCandidates = HashMap<ID, u32>;

#[derive(Debug)]
pub enum Coloring<T: Target> {
    Colored(Assignment<T>),
    NeedsSpill(SpillCandidates),
}

/// One node per tied group. Nodes are linked when they cannot share a physical
/// register.
#[derive(Debug)]
pub struct InterferenceGraph<T: Target> {
    graph: Graph<Vec<Register<T>>>,
    nodes: HashMap<Register<T>, ID>,
}

impl<T: Target> InterferenceGraph<T> {
    pub fn build(liveness: &Liveness<T>) -> Self {
        let groups = liveness.groups();
        let mut graph = Graph::with_capacity(groups.len());
        let mut nodes = HashMap::new();
        let mut ids = Vec::with_capacity(groups.len());

        for group in groups {
            let id = graph.insert(group.clone());
            for &reg in group {
                nodes.insert(reg, id);
            }
            ids.push(id);
        }

        for (i, &one) in ids.iter().enumerate() {
            for &other in &ids[i + 1..] {
                if interferes(liveness, graph.get(one).val(), graph.get(other).val()) {
                    graph.double_link(one, other);
                }
            }
        }

        debug!("interference graph: {} nodes", graph.len());
        InterferenceGraph { graph, nodes }
    }

    pub fn id(&self, reg: &Register<T>) -> Option<ID> {
        self.nodes.get(reg).copied()
    }

    pub fn registers(&self, id: ID) -> &[Register<T>] {
        self.graph.get(id).val()
    }

    pub fn ids(&self) -> impl Iterator<Item = ID> + '_ {
        self.graph.nodes().iter().map(|node| node.id())
    }

    pub fn neighbors(&self, id: ID) -> impl Iterator<Item = ID> + '_ {
        self.graph.adj(id)
    }

    pub fn interferes(&self, one: ID, other: ID) -> bool {
        self.graph.is_linked(one, other)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Register class of the node's first virtual register.
    fn class(&self, id: ID) -> Option<T::Class> {
        self.registers(id)
            .iter()
            .find_map(Register::as_virtual)
            .map(|vreg| vreg.class)
    }
}

fn interferes<T: Target>(
    liveness: &Liveness<T>,
    one: &[Register<T>],
    other: &[Register<T>],
) -> bool {
    let has_physical = |group: &[Register<T>]| group.iter().any(|reg| reg.as_physical().is_some());
    if has_physical(one) && has_physical(other) {
        return true;
    }

    one.iter().flat_map(|reg| liveness.ranges(reg)).any(|a| {
        other
            .iter()
            .flat_map(|reg| liveness.ranges(reg))
            .any(|b| a.overlaps(b))
    })
}

/// Greedy coloring, most constrained node first.
///
/// Nodes holding a physical register keep it. Every other node takes the first
/// register of its class that no colored neighbour (or anything aliasing a
/// neighbour's register) occupies. A node that finds no register stays
/// uncolored; it and its colored neighbours become spill candidates.
pub fn color<T: Target>(graph: &InterferenceGraph<T>) -> Result<Coloring<T>, UnsupportedConstruct> {
    let mut assignment = Assignment::<T>::new();

    for id in graph.ids() {
        let mut physical = graph.registers(id).iter().filter_map(Register::as_physical);
        if let Some(first) = physical.next() {
            if let Some(second) = physical.find(|reg| *reg != first) {
                return Err(UnsupportedConstruct::ConflictingTiedRegisters {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
            assignment.insert(id, first);
        }
    }

    let mut priority: HashMap<ID, u32> = HashMap::new();
    let mut heap = BinaryHeap::new();
    for id in graph.ids().filter(|id| !assignment.contains_key(id)) {
        let colored = graph
            .neighbors(id)
            .filter(|n| assignment.contains_key(n))
            .count() as u32;
        priority.insert(id, colored);
        heap.push((colored, Reverse(id)));
    }

    let mut done = HashSet::new();
    let mut candidates = SpillCandidates::new();

    while let Some((prio, Reverse(id))) = heap.pop() {
        // stale entry
        if done.contains(&id) || priority.get(&id) != Some(&prio) {
            continue;
        }
        done.insert(id);

        let class = match graph.class(id) {
            Some(class) => class,
            None => continue,
        };

        let blocked: HashSet<T::Register> = graph
            .neighbors(id)
            .filter_map(|n| assignment.get(&n))
            .flat_map(|reg| reg.alias_set())
            .collect();

        match class.registers().iter().find(|reg| !blocked.contains(*reg)) {
            Some(&reg) => {
                trace!("{:?} -> {}", graph.registers(id), reg);
                assignment.insert(id, reg);

                for n in graph.neighbors(id) {
                    if done.contains(&n) {
                        continue;
                    }
                    if let Some(p) = priority.get_mut(&n) {
                        *p += 1;
                        heap.push((*p, Reverse(n)));
                    }
                }
            }
            None => {
                trace!("{:?} is uncolorable", graph.registers(id));
                *candidates.entry(id).or_default() += 1;
                for n in graph.neighbors(id) {
                    if assignment.contains_key(&n) {
                        *candidates.entry(n).or_default() += 1;
                    }
                }
            }
        }
    }

    if candidates.is_empty() {
        debug!("colored {} nodes", assignment.len());
        Ok(Coloring::Colored(assignment))
    } else {
        debug!("{} spill candidates", candidates.len());
        Ok(Coloring::NeedsSpill(candidates))
    }
}
