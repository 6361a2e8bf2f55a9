use std::{collections::HashMap, hash::Hash};

/// Disjoint sets over arbitrary keys. Keys never passed to [`UnionFind::union`]
/// are not members of any set.
#[derive(Debug, Clone)]
pub struct UnionFind<E> {
    parent: HashMap<E, E>,
}

impl<E: Copy + Eq + Hash> UnionFind<E> {
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
        }
    }

    pub fn contains(&self, e: E) -> bool {
        self.parent.contains_key(&e)
    }

    /// Representative of `e`'s set, compressing the path on the way.
    pub fn root(&mut self, mut e: E) -> Option<E> {
        if !self.contains(e) {
            return None;
        }

        loop {
            let parent = self.parent[&e];
            if parent == e {
                return Some(e);
            }

            let grand = self.parent[&parent];
            self.parent.insert(e, grand);
            e = parent;
        }
    }

    pub fn find(&mut self, e1: E, e2: E) -> bool {
        match (self.root(e1), self.root(e2)) {
            (Some(r1), Some(r2)) => r1 == r2,
            _ => false,
        }
    }

    pub fn union(&mut self, e1: E, e2: E) {
        self.parent.entry(e1).or_insert(e1);
        self.parent.entry(e2).or_insert(e2);

        if let (Some(r1), Some(r2)) = (self.root(e1), self.root(e2)) {
            self.parent.insert(r1, r2);
        }
    }
}

impl<E: Copy + Eq + Hash> Default for UnionFind<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new();
        assert_eq!(uf.root(1), None);
        assert!(!uf.find(1, 1));

        uf.union(1, 2);
        uf.union(3, 4);
        assert!(uf.find(1, 2));
        assert!(!uf.find(2, 3));

        uf.union(2, 4);
        assert!(uf.find(1, 3));
        assert_eq!(uf.root(1), uf.root(4));
        assert!(!uf.contains(5));
    }
}
