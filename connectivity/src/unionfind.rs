/// Disjoint-set over a flat arena of item slots. Indices into the scope
/// array stand in for item handles, which keeps the hot union/find loop on
/// contiguous memory and free of dangling references.
pub struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut i: usize) -> usize {
        // Path halving.
        while self.parent[i] as usize != i {
            let grandparent = self.parent[self.parent[i] as usize];
            self.parent[i] = grandparent;
            i = grandparent as usize;
        }
        i
    }

    /// Returns false if the two were already in the same set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra as u32;
        self.size[ra] += self.size[rb];
        true
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Groups the arena into its sets. Each set is ascending; sets are
    /// ordered by their smallest member, so the output is deterministic.
    pub fn extract_sets(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            let root = self.find(i);
            by_root[root].push(i);
        }
        let mut sets: Vec<Vec<usize>> = by_root.into_iter().filter(|s| !s.is_empty()).collect();
        sets.sort_by_key(|s| s[0]);
        sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_find() {
        let mut uf = UnionFind::new(6);
        assert!(uf.union(0, 1));
        assert!(uf.union(2, 3));
        assert!(!uf.union(1, 0));
        assert!(uf.same(0, 1));
        assert!(!uf.same(0, 2));

        uf.union(1, 3);
        assert!(uf.same(0, 2));
        assert!(!uf.same(0, 5));
    }

    #[test]
    fn extract_sets_is_deterministic() {
        let mut uf = UnionFind::new(5);
        uf.union(4, 2);
        uf.union(1, 3);
        let sets = uf.extract_sets();
        assert_eq!(sets, vec![vec![0], vec![1, 3], vec![2, 4]]);
    }

    #[test]
    fn singletons_survive() {
        let mut uf = UnionFind::new(3);
        assert_eq!(uf.extract_sets().len(), 3);
    }
}
