use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ID(usize);

impl ID {
    pub(crate) fn from_index(index: usize) -> Self {
        ID(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Node<T> {
    id: ID,
    val: T,
    succ: BTreeSet<ID>,
    pred: BTreeSet<ID>,
}

impl<T> Node<T> {
    pub fn id(&self) -> ID {
        self.id
    }

    pub fn val(&self) -> &T {
        &self.val
    }

    fn new(val: T, id: ID) -> Self {
        Node {
            id,
            val,
            succ: BTreeSet::new(),
            pred: BTreeSet::new(),
        }
    }

    pub fn succ(&self) -> impl Iterator<Item = ID> + '_ {
        self.succ.iter().copied()
    }

    pub fn pred(&self) -> impl Iterator<Item = ID> + '_ {
        self.pred.iter().copied()
    }

    /// Neighbours regardless of edge direction.
    pub fn adj(&self) -> impl Iterator<Item = ID> + '_ {
        self.succ.union(&self.pred).copied()
    }
}

impl<T> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Node<T> {}

/// Node ids are handed out densely in insertion order.
#[derive(Debug)]
pub struct Graph<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Graph<T> {
    pub fn new() -> Self {
        Graph { nodes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Graph {
            nodes: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&self, id: ID) -> &Node<T> {
        &self.nodes[id.0]
    }

    pub fn insert(&mut self, val: T) -> ID {
        let id = self.nodes.len();
        self.nodes.push(Node::new(val, ID(id)));
        ID(id)
    }

    /// Add a directed edge. Returns false if it already existed.
    pub fn link(&mut self, from: ID, to: ID) -> bool {
        let inserted = self.nodes[from.0].succ.insert(to);
        self.nodes[to.0].pred.insert(from);
        inserted
    }

    /// Add an undirected edge.
    pub fn double_link(&mut self, one: ID, other: ID) {
        self.link(one, other);
        self.link(other, one);
    }

    pub fn is_linked(&self, from: ID, to: ID) -> bool {
        self.nodes[from.0].succ.contains(&to)
    }

    pub fn succ(&self, id: ID) -> impl Iterator<Item = ID> + '_ {
        self.nodes[id.0].succ()
    }

    pub fn pred(&self, id: ID) -> impl Iterator<Item = ID> + '_ {
        self.nodes[id.0].pred()
    }

    pub fn adj(&self, id: ID) -> impl Iterator<Item = ID> + '_ {
        self.nodes[id.0].adj()
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link() {
        let mut graph = Graph::new();
        let a = graph.insert("a");
        let b = graph.insert("b");
        let c = graph.insert("c");

        assert!(graph.link(a, b));
        assert!(!graph.link(a, b));
        graph.double_link(b, c);

        assert_eq!(graph.succ(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(graph.pred(b).collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(graph.adj(b).collect::<Vec<_>>(), vec![a, c]);
        assert!(graph.is_linked(c, b));
        assert!(!graph.is_linked(b, a));
        assert_eq!(graph.get(c).val(), &"c");
        assert_eq!(c.index(), 2);
    }
}
